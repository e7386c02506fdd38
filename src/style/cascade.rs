//! Cascade and inheritance resolution
//!
//! For every captured element the resolver produces a map from property name
//! to a [`ResolvedProperty`] recording where the value came from:
//!
//! - `Explicit`: declared on the element itself. When several declarations
//!   conflict, `!important`, then inline style, then selector specificity,
//!   then source order decide.
//! - `Inherited`: taken from the nearest ancestor that declares a naturally
//!   inheriting property, with that ancestor's id and distance. A property
//!   nobody declares resolves to its initial value, recorded as inherited
//!   from no node at distance 0.
//!
//! Values that cannot be parsed are kept as their raw string with
//! `computed_fallback` set; the element is never skipped.

use super::properties::{self, PROPERTIES};
use super::specificity::{specificity_of, DeclarationRank, Specificity};
use super::value::StyleValue;
use crate::ir::{Marker, MarkerKind, NodeId};
use crate::snapshot::RawElement;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;

/// Where a resolved value came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum Provenance {
    Explicit {
        specificity: Specificity,
    },
    Inherited {
        /// Declaring ancestor; `None` for the property's initial value
        from: Option<NodeId>,
        distance: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedProperty {
    pub value: StyleValue,
    pub raw: String,
    pub provenance: Provenance,
    /// The raw string could not be parsed; `value` is `StyleValue::Raw`
    #[serde(default)]
    pub computed_fallback: bool,
}

impl ResolvedProperty {
    pub fn is_explicit(&self) -> bool {
        matches!(self.provenance, Provenance::Explicit { .. })
    }

    pub fn is_inherited(&self) -> bool {
        matches!(self.provenance, Provenance::Inherited { .. })
    }
}

/// Resolved properties of one element
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedStyle {
    properties: BTreeMap<String, ResolvedProperty>,
}

impl ResolvedStyle {
    pub fn get(&self, name: &str) -> Option<&ResolvedProperty> {
        self.properties.get(name)
    }

    /// Raw string of a property, or `""` when nothing resolves
    pub fn raw(&self, name: &str) -> &str {
        self.properties.get(name).map(|p| p.raw.as_str()).unwrap_or("")
    }

    pub fn value(&self, name: &str) -> Option<&StyleValue> {
        self.properties.get(name).map(|p| &p.value)
    }

    /// Lower-cased keyword, falling back to the trimmed raw text
    pub fn keyword(&self, name: &str) -> String {
        match self.value(name) {
            Some(StyleValue::Keyword(k)) => k.clone(),
            _ => self.raw(name).trim().to_ascii_lowercase(),
        }
    }

    pub fn length(&self, name: &str) -> Option<f32> {
        self.value(name).and_then(StyleValue::as_length)
    }

    pub fn number(&self, name: &str) -> Option<f32> {
        self.value(name).and_then(StyleValue::as_number)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResolvedProperty)> {
        self.properties.iter()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Custom properties (`--name`) visible on this element
    pub fn custom_properties(&self) -> impl Iterator<Item = (&str, &ResolvedProperty)> {
        self.properties
            .iter()
            .filter(|(k, _)| k.starts_with("--"))
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn insert(&mut self, name: impl Into<String>, property: ResolvedProperty) {
        self.properties.insert(name.into(), property);
    }
}

/// Resolver output for a whole capture
#[derive(Debug, Clone, Default)]
pub struct ResolvedStyles {
    by_node: HashMap<NodeId, ResolvedStyle>,
    markers: HashMap<NodeId, Vec<Marker>>,
}

impl ResolvedStyles {
    pub fn get(&self, id: &str) -> Option<&ResolvedStyle> {
        self.by_node.get(id)
    }

    pub fn markers(&self, id: &str) -> &[Marker] {
        self.markers.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_node.is_empty()
    }
}

/// One explicit winner per property on a node
#[derive(Debug, Clone)]
struct Winner {
    rank: DeclarationRank,
    raw: String,
}

fn initial_values() -> &'static HashMap<&'static str, StyleValue> {
    static INITIAL: OnceLock<HashMap<&'static str, StyleValue>> = OnceLock::new();
    INITIAL.get_or_init(|| {
        PROPERTIES
            .iter()
            .map(|p| {
                let v = StyleValue::parse(p.initial).unwrap_or_else(|_| StyleValue::Keyword(p.initial.to_string()));
                (p.name, v)
            })
            .collect()
    })
}

fn is_css_wide_keyword(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "inherit" | "initial" | "unset" | "revert" | "revert-layer"
    )
}

/// Resolves captured declarations into per-element computed records
#[derive(Debug, Default)]
pub struct CascadeResolver;

impl CascadeResolver {
    pub fn new() -> Self {
        CascadeResolver
    }

    pub fn resolve(&self, elements: &[RawElement]) -> ResolvedStyles {
        let mut index: HashMap<&str, &RawElement> = HashMap::with_capacity(elements.len());
        for el in elements {
            if index.insert(el.id.as_str(), el).is_some() {
                warn!("duplicate element id '{}' in capture; last one wins", el.id);
            }
        }

        let explicit: HashMap<&str, BTreeMap<String, Winner>> = index
            .iter()
            .map(|(id, el)| (*id, collect_explicit(el)))
            .collect();

        let mut out = ResolvedStyles::default();
        for el in elements {
            if out.by_node.contains_key(&el.id) {
                continue;
            }
            let ancestors = ancestor_chain(&index, &el.id);
            let (style, markers) = resolve_element(&el.id, &ancestors, &explicit);
            if !markers.is_empty() {
                out.markers.insert(el.id.clone(), markers);
            }
            out.by_node.insert(el.id.clone(), style);
        }
        debug!("resolved styles for {} elements", out.by_node.len());
        out
    }
}

/// Ancestor ids nearest first. Stops at a missing parent or a repeated id.
fn ancestor_chain<'a>(index: &HashMap<&'a str, &'a RawElement>, id: &str) -> Vec<&'a str> {
    let mut chain = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    seen.insert(id);
    let mut cur = index.get(id).and_then(|el| el.parent_id.as_deref());
    while let Some(pid) = cur {
        let Some((&key, parent)) = index.get_key_value(pid) else {
            break;
        };
        if !seen.insert(key) {
            debug!("cycle in parent chain of '{}' cut at '{}'", id, key);
            break;
        }
        chain.push(key);
        cur = parent.parent_id.as_deref();
    }
    chain
}

fn collect_explicit(el: &RawElement) -> BTreeMap<String, Winner> {
    let mut winners: BTreeMap<String, Winner> = BTreeMap::new();

    let mut offer = |property: &str, raw: &str, rank: DeclarationRank| {
        let (raw, rank) = match raw.trim().strip_suffix("!important") {
            Some(stripped) => (stripped.trim(), DeclarationRank { important: true, ..rank }),
            None => (raw.trim(), rank),
        };
        let longhands = properties::expand_shorthand(property, raw)
            .unwrap_or_else(|| vec![(property.to_string(), raw.to_string())]);
        for (name, value) in longhands {
            let name = if name.starts_with("--") { name } else { name.to_ascii_lowercase() };
            let replace = match winners.get(&name) {
                Some(existing) => rank >= existing.rank,
                None => true,
            };
            if replace {
                winners.insert(name, Winner { rank, raw: value });
            }
        }
    };

    for (property, raw) in &el.styles {
        offer(
            property,
            raw,
            DeclarationRank {
                important: false,
                inline: false,
                specificity: Specificity::ZERO,
                source_order: 0,
            },
        );
    }
    for decl in &el.rules {
        let (inline, specificity) = match decl.selector.as_deref() {
            Some(sel) => (false, specificity_of(sel)),
            None => (true, Specificity::ZERO),
        };
        offer(
            &decl.property,
            &decl.value,
            DeclarationRank {
                important: decl.important,
                inline,
                specificity,
                source_order: decl.source_order,
            },
        );
    }
    winners
}

fn parse_or_fallback(
    name: &str,
    raw: &str,
    markers: &mut Vec<Marker>,
) -> (StyleValue, bool) {
    match StyleValue::parse(raw) {
        Ok(v) => (v, false),
        Err(e) => {
            debug!("unparseable value for {}: '{}' ({})", name, raw, e);
            markers.push(Marker::new(MarkerKind::StyleFallback, name, e.to_string()).with_raw(raw));
            (StyleValue::Raw(raw.to_string()), true)
        }
    }
}

fn initial_property(name: &str) -> Option<ResolvedProperty> {
    let raw = properties::initial_value(name)?;
    let value = initial_values()
        .get(name)
        .cloned()
        .unwrap_or_else(|| StyleValue::Keyword(raw.to_string()));
    Some(ResolvedProperty {
        value,
        raw: raw.to_string(),
        provenance: Provenance::Inherited { from: None, distance: 0 },
        computed_fallback: false,
    })
}

fn resolve_element(
    id: &str,
    ancestors: &[&str],
    explicit: &HashMap<&str, BTreeMap<String, Winner>>,
) -> (ResolvedStyle, Vec<Marker>) {
    let own = explicit.get(id);
    let mut markers = Vec::new();
    let mut style = ResolvedStyle::default();

    let mut names: BTreeSet<String> = PROPERTIES.iter().map(|p| p.name.to_string()).collect();
    if let Some(own) = own {
        names.extend(own.keys().cloned());
    }
    for anc in ancestors {
        if let Some(decls) = explicit.get(anc) {
            names.extend(decls.keys().filter(|k| k.starts_with("--")).cloned());
        }
    }

    for name in names {
        let declared = own.and_then(|m| m.get(&name));
        let wide = declared.map(|w| w.raw.trim().to_ascii_lowercase());

        if let (Some(winner), None) = (declared, wide.as_deref().filter(|w| is_css_wide_keyword(w))) {
            let (value, fallback) = parse_or_fallback(&name, &winner.raw, &mut markers);
            style.insert(
                name,
                ResolvedProperty {
                    value,
                    raw: winner.raw.clone(),
                    provenance: Provenance::Explicit {
                        specificity: winner.rank.specificity,
                    },
                    computed_fallback: fallback,
                },
            );
            continue;
        }

        let inherits = match wide.as_deref() {
            Some("inherit") => true,
            Some("initial") => false,
            _ => properties::is_inherited(&name),
        };

        let mut resolved = None;
        if inherits {
            for (depth, anc) in ancestors.iter().enumerate() {
                let Some(w) = explicit.get(anc).and_then(|m| m.get(&name)) else {
                    continue;
                };
                match w.raw.trim().to_ascii_lowercase().as_str() {
                    // keep walking: the ancestor itself inherits
                    "inherit" | "unset" | "revert" | "revert-layer" => continue,
                    "initial" => break,
                    _ => {}
                }
                // the declaring ancestor already carries the marker
                let (value, fallback) = parse_or_fallback(&name, &w.raw, &mut Vec::new());
                resolved = Some(ResolvedProperty {
                    value,
                    raw: w.raw.clone(),
                    provenance: Provenance::Inherited {
                        from: Some((*anc).to_string()),
                        distance: depth as u32 + 1,
                    },
                    computed_fallback: fallback,
                });
                break;
            }
        }

        if let Some(prop) = resolved.or_else(|| initial_property(&name)) {
            style.insert(name, prop);
        }
    }

    (style, markers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::RawDeclaration;

    fn tree() -> Vec<RawElement> {
        vec![
            RawElement::new("html", "html", None).with_style("color", "red").with_style("font-size", "20px"),
            RawElement::new("body", "body", Some("html")).with_style("display", "block"),
            RawElement::new("p", "p", Some("body")).with_style("font-size", "12px"),
        ]
    }

    #[test]
    fn explicit_values_win() {
        let styles = CascadeResolver::new().resolve(&tree());
        let p = styles.get("p").unwrap();
        let fs = p.get("font-size").unwrap();
        assert!(fs.is_explicit());
        assert_eq!(fs.value, StyleValue::Length(12.0));
    }

    #[test]
    fn inherited_values_record_source_and_distance() {
        let styles = CascadeResolver::new().resolve(&tree());
        let color = styles.get("p").unwrap().get("color").unwrap();
        assert_eq!(
            color.provenance,
            Provenance::Inherited {
                from: Some("html".into()),
                distance: 2
            }
        );
        assert_eq!(color.raw, "red");
    }

    #[test]
    fn non_inherited_properties_use_initial_value() {
        let styles = CascadeResolver::new().resolve(&tree());
        let display = styles.get("p").unwrap().get("display").unwrap();
        assert_eq!(display.raw, "inline");
        assert_eq!(display.provenance, Provenance::Inherited { from: None, distance: 0 });
    }

    #[test]
    fn specificity_resolves_conflicts_on_one_node() {
        let mut el = RawElement::new("a", "a", None);
        el.rules = vec![
            RawDeclaration {
                source_order: 5,
                ..RawDeclaration::new("color", "blue", Some("a"))
            },
            RawDeclaration {
                source_order: 1,
                ..RawDeclaration::new("color", "green", Some("#x"))
            },
        ];
        let styles = CascadeResolver::new().resolve(&[el]);
        assert_eq!(styles.get("a").unwrap().raw("color"), "green");
    }

    #[test]
    fn important_and_inline_precedence() {
        let mut el = RawElement::new("a", "a", None);
        el.rules = vec![
            RawDeclaration::new("color", "blue", None),
            RawDeclaration::new("color", "green", Some("#x")),
            RawDeclaration::new("width", "10px !important", Some("a")),
            RawDeclaration::new("width", "20px", None),
        ];
        let styles = CascadeResolver::new().resolve(&[el]);
        let s = styles.get("a").unwrap();
        assert_eq!(s.raw("color"), "blue");
        assert_eq!(s.raw("width"), "10px");
    }

    #[test]
    fn malformed_values_fall_back_to_raw() {
        let el = RawElement::new("a", "div", None).with_style("width", "12qx");
        let styles = CascadeResolver::new().resolve(&[el]);
        let w = styles.get("a").unwrap().get("width").unwrap();
        assert!(w.computed_fallback);
        assert!(w.is_explicit());
        assert_eq!(w.value, StyleValue::Raw("12qx".into()));
        assert_eq!(styles.markers("a").len(), 1);
        assert_eq!(styles.markers("a")[0].kind, MarkerKind::StyleFallback);
    }

    #[test]
    fn inherited_malformed_value_marks_only_the_declaring_node() {
        let elements = vec![
            RawElement::new("root", "div", None).with_style("letter-spacing", "3qx"),
            RawElement::new("mid", "div", Some("root")),
            RawElement::new("leaf", "span", Some("mid")),
        ];
        let styles = CascadeResolver::new().resolve(&elements);
        assert_eq!(styles.markers("root").len(), 1);
        assert!(styles.markers("mid").is_empty());
        assert!(styles.markers("leaf").is_empty());
        let inherited = styles.get("leaf").unwrap().get("letter-spacing").unwrap();
        assert!(inherited.computed_fallback);
        assert!(inherited.is_inherited());
    }

    #[test]
    fn inherit_keyword_walks_up() {
        let els = vec![
            RawElement::new("a", "div", None).with_style("border-top-color", "red"),
            RawElement::new("b", "div", Some("a")).with_style("border-top-color", "inherit"),
        ];
        let styles = CascadeResolver::new().resolve(&els);
        let c = styles.get("b").unwrap().get("border-top-color").unwrap();
        assert!(c.is_inherited());
        assert_eq!(c.raw, "red");
    }

    #[test]
    fn cyclic_parents_do_not_hang() {
        let els = vec![
            RawElement::new("a", "div", Some("b")).with_style("color", "red"),
            RawElement::new("b", "div", Some("a")),
        ];
        let styles = CascadeResolver::new().resolve(&els);
        assert_eq!(styles.get("b").unwrap().raw("color"), "red");
        assert_eq!(styles.len(), 2);
    }

    #[test]
    fn custom_properties_inherit() {
        let els = vec![
            RawElement::new("root", "html", None).with_style("--brand", "#ff0000"),
            RawElement::new("child", "div", Some("root")),
        ];
        let styles = CascadeResolver::new().resolve(&els);
        let child = styles.get("child").unwrap();
        let brand: Vec<_> = child.custom_properties().collect();
        assert_eq!(brand.len(), 1);
        assert!(brand[0].1.is_inherited());
    }

    #[test]
    fn every_registered_property_is_explicit_or_inherited() {
        let styles = CascadeResolver::new().resolve(&tree());
        for id in ["html", "body", "p"] {
            let s = styles.get(id).unwrap();
            for def in PROPERTIES {
                let p = s.get(def.name).unwrap();
                assert!(p.is_explicit() ^ p.is_inherited());
            }
        }
    }
}
