//! Selector specificity and declaration ranking
//! Ref: <https://www.w3.org/TR/selectors-4/#specificity-rules>

use serde::{Deserialize, Serialize};

/// Specificity triple (ids, classes/attributes/pseudo-classes, types)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Specificity(pub u16, pub u16, pub u16);

impl Specificity {
    pub const ZERO: Specificity = Specificity(0, 0, 0);

    fn add(self, other: Specificity) -> Specificity {
        Specificity(
            self.0.saturating_add(other.0),
            self.1.saturating_add(other.1),
            self.2.saturating_add(other.2),
        )
    }
}

/// Specificity of a selector list is the highest of its members
pub fn specificity_of(selector: &str) -> Specificity {
    super::tokens::split_top_level(selector, ',')
        .into_iter()
        .map(specificity_of_complex)
        .max()
        .unwrap_or(Specificity::ZERO)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || c == '\\'
}

fn specificity_of_complex(selector: &str) -> Specificity {
    let chars: Vec<char> = selector.chars().collect();
    let mut spec = Specificity::ZERO;
    let mut i = 0;
    // true when the next identifier starts a compound (type selector position)
    let mut at_compound_start = true;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '#' => {
                spec.0 = spec.0.saturating_add(1);
                i = skip_ident(&chars, i + 1);
                at_compound_start = false;
            }
            '.' => {
                spec.1 = spec.1.saturating_add(1);
                i = skip_ident(&chars, i + 1);
                at_compound_start = false;
            }
            '[' => {
                spec.1 = spec.1.saturating_add(1);
                while i < chars.len() && chars[i] != ']' {
                    i += 1;
                }
                i += 1;
                at_compound_start = false;
            }
            ':' => {
                let pseudo_element = chars.get(i + 1) == Some(&':');
                let start = if pseudo_element { i + 2 } else { i + 1 };
                let end = skip_ident(&chars, start);
                let name: String = chars[start..end].iter().collect::<String>().to_ascii_lowercase();
                i = end;
                let mut args = String::new();
                if chars.get(i) == Some(&'(') {
                    let mut depth = 0;
                    let arg_start = i + 1;
                    while i < chars.len() {
                        match chars[i] {
                            '(' => depth += 1,
                            ')' => {
                                depth -= 1;
                                if depth == 0 {
                                    break;
                                }
                            }
                            _ => {}
                        }
                        i += 1;
                    }
                    args = chars[arg_start..i.min(chars.len())].iter().collect();
                    i += 1;
                }
                let legacy_pseudo_element = matches!(
                    name.as_str(),
                    "before" | "after" | "first-line" | "first-letter"
                );
                spec = match name.as_str() {
                    "where" => spec,
                    "is" | "not" | "has" | "matches" => spec.add(specificity_of(&args)),
                    _ if pseudo_element || legacy_pseudo_element => {
                        Specificity(spec.0, spec.1, spec.2.saturating_add(1))
                    }
                    _ => Specificity(spec.0, spec.1.saturating_add(1), spec.2),
                };
                at_compound_start = false;
            }
            '*' => {
                i += 1;
                at_compound_start = false;
            }
            '>' | '+' | '~' | ' ' | '\t' | '\n' => {
                i += 1;
                at_compound_start = true;
            }
            c if is_ident_char(c) && at_compound_start => {
                spec.2 = spec.2.saturating_add(1);
                i = skip_ident(&chars, i);
                at_compound_start = false;
            }
            _ => i += 1,
        }
    }
    spec
}

fn skip_ident(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && is_ident_char(chars[i]) {
        i += 1;
    }
    i
}

/// Ordering key for conflicting declarations on one node. Higher wins;
/// fields compare in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct DeclarationRank {
    pub important: bool,
    /// Inline `style` attribute outranks any selector
    pub inline: bool,
    pub specificity: Specificity,
    pub source_order: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_ids_classes_and_types() {
        assert_eq!(specificity_of("div"), Specificity(0, 0, 1));
        assert_eq!(specificity_of("#main .item > a:hover"), Specificity(1, 2, 1));
        assert_eq!(specificity_of("ul li.active[data-x]"), Specificity(0, 2, 2));
        assert_eq!(specificity_of("*"), Specificity(0, 0, 0));
        assert_eq!(specificity_of("p::before"), Specificity(0, 0, 2));
    }

    #[test]
    fn functional_pseudo_classes() {
        assert_eq!(specificity_of(":where(#a) p"), Specificity(0, 0, 1));
        assert_eq!(specificity_of("a:not(#b)"), Specificity(1, 0, 1));
    }

    #[test]
    fn selector_list_takes_maximum() {
        assert_eq!(specificity_of("p, #x"), Specificity(1, 0, 0));
    }

    #[test]
    fn rank_orders_important_then_inline_then_specificity() {
        let low = DeclarationRank {
            important: false,
            inline: true,
            specificity: Specificity::ZERO,
            source_order: 0,
        };
        let high = DeclarationRank {
            important: true,
            inline: false,
            specificity: Specificity::ZERO,
            source_order: 0,
        };
        assert!(high > low);
        let by_spec = DeclarationRank {
            important: false,
            inline: false,
            specificity: Specificity(1, 0, 0),
            source_order: 0,
        };
        let by_order = DeclarationRank {
            important: false,
            inline: false,
            specificity: Specificity(0, 5, 0),
            source_order: 10,
        };
        assert!(by_spec > by_order);
    }
}
