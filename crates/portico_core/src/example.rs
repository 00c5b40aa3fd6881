//! Criteria derivation for query-by-example.

use tracing::warn;

use portico_model::{Persistent, Value};
use portico_store::Criterion;

/// Derives the AND-combined criteria a sample instance implies.
///
/// Walks the descriptor chain most-derived level first; a name declared
/// at a derived level shadows the base declaration whether or not it
/// ends up contributing. Per name, in order:
///
/// - names on the exclusion list and array- or relation-kinded
///   declarations are dropped;
/// - a declaration with no read accessor is dropped silently;
/// - unset values (null, numeric zero, `0.0`, epoch-zero timestamp,
///   empty text) filter nothing;
/// - a value whose shape contradicts the declared kind is a metadata
///   inconsistency: logged at `warn` and dropped, the walk continues.
///
/// Surviving text becomes a `like` pattern, everything else an equality
/// check.
pub(crate) fn criteria_from<E: Persistent>(example: &E, excluded: &[&str]) -> Vec<Criterion> {
    let mut criteria = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    for level in E::def().chain() {
        for attr in level.declared {
            if seen.contains(&attr.name) {
                continue;
            }
            seen.push(attr.name);
            if excluded.contains(&attr.name) || !attr.kind.example_eligible() {
                continue;
            }
            let Some(accessor) = E::accessors().iter().find(|a| a.attr == attr.name) else {
                continue;
            };
            let value = (accessor.read)(example);
            if value.is_zero() {
                continue;
            }
            if !attr.kind.admits(&value) {
                warn!(
                    entity = level.name,
                    attribute = attr.name,
                    declared = ?attr.kind,
                    found = value.type_name(),
                    "sample value contradicts the declared kind, skipping"
                );
                continue;
            }
            match value {
                Value::Text(pattern) => criteria.push(Criterion::like(attr.name, pattern)),
                other => criteria.push(Criterion::eq(attr.name, other)),
            }
        }
    }
    criteria
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_model::{
        Accessor, AttrDef, AttrKind, EntityDef, Key, ModelResult, Record, Timestamp,
    };
    use portico_store::CriterionOp;

    // "secret" has no accessor; "toys" is array-kinded.
    static CREATURE: EntityDef = EntityDef {
        name: "Creature",
        parent: None,
        key_attr: Some("id"),
        declared: &[
            AttrDef::new("name", AttrKind::Text),
            AttrDef::new("legs", AttrKind::Int),
            AttrDef::new("weight", AttrKind::Float),
            AttrDef::new("alive", AttrKind::Bool),
            AttrDef::new("born", AttrKind::Timestamp),
            AttrDef::new("pack", AttrKind::Reference),
            AttrDef::new("toys", AttrKind::Array),
            AttrDef::new("secret", AttrKind::Text),
        ],
    };

    #[derive(Default)]
    struct Creature {
        key: Option<Key>,
        name: String,
        legs: i64,
        weight: f64,
        alive: Option<bool>,
        born: i64,
        pack: i64,
        toys: Vec<Value>,
    }

    impl Persistent for Creature {
        fn def() -> &'static EntityDef {
            &CREATURE
        }

        fn accessors() -> &'static [Accessor<Self>] {
            static ACCESSORS: [Accessor<Creature>; 7] = [
                Accessor::new("name", |c: &Creature| Value::from(c.name.as_str())),
                Accessor::new("legs", |c: &Creature| Value::from(c.legs)),
                Accessor::new("weight", |c: &Creature| Value::from(c.weight)),
                Accessor::new("alive", |c: &Creature| Value::from(c.alive)),
                Accessor::new("born", |c: &Creature| {
                    Value::from(Timestamp::from_millis(c.born))
                }),
                Accessor::new("pack", |c: &Creature| Value::from(c.pack)),
                Accessor::new("toys", |c: &Creature| Value::Array(c.toys.clone())),
            ];
            &ACCESSORS
        }

        fn key(&self) -> Option<Key> {
            self.key
        }

        fn assign_key(&mut self, key: Key) {
            self.key = Some(key);
        }

        fn from_record(record: &Record) -> ModelResult<Self> {
            Ok(Creature {
                key: Some(record.require_key()?),
                name: record.text("name")?,
                legs: record.int("legs")?,
                ..Creature::default()
            })
        }
    }

    fn names(criteria: &[Criterion]) -> Vec<&str> {
        criteria.iter().map(|c| c.attribute.as_str()).collect()
    }

    #[test]
    fn blank_sample_contributes_nothing() {
        let criteria = criteria_from(&Creature::default(), &[]);
        assert!(criteria.is_empty());
    }

    #[test]
    fn set_values_contribute_like_for_text_and_eq_otherwise() {
        let sample = Creature {
            name: "Rex%".to_string(),
            legs: 4,
            weight: 7.5,
            alive: Some(true),
            born: 86_400_000,
            pack: 3,
            ..Creature::default()
        };

        let criteria = criteria_from(&sample, &[]);
        assert_eq!(
            names(&criteria),
            ["name", "legs", "weight", "alive", "born", "pack"]
        );
        assert_eq!(criteria[0].op, CriterionOp::Like);
        assert_eq!(criteria[0].value, Value::Text("Rex%".to_string()));
        for criterion in &criteria[1..] {
            assert_eq!(criterion.op, CriterionOp::Eq);
        }
        assert_eq!(criteria[3].value, Value::Bool(true));
        assert_eq!(
            criteria[4].value,
            Value::Timestamp(Timestamp::from_millis(86_400_000))
        );
    }

    #[test]
    fn zero_and_empty_values_count_as_unset() {
        let sample = Creature {
            name: String::new(),
            legs: 0,
            weight: 0.0,
            born: 0,
            pack: 0,
            ..Creature::default()
        };

        assert!(criteria_from(&sample, &[]).is_empty());
    }

    #[test]
    fn false_is_a_set_bool() {
        let sample = Creature {
            alive: Some(false),
            ..Creature::default()
        };

        let criteria = criteria_from(&sample, &[]);
        assert_eq!(names(&criteria), ["alive"]);
        assert_eq!(criteria[0].value, Value::Bool(false));
    }

    #[test]
    fn exclusions_beat_set_values() {
        let sample = Creature {
            name: "Rex".to_string(),
            legs: 4,
            ..Creature::default()
        };

        let criteria = criteria_from(&sample, &["name"]);
        assert_eq!(names(&criteria), ["legs"]);
    }

    #[test]
    fn arrays_never_contribute() {
        let sample = Creature {
            toys: vec![Value::Int(1)],
            ..Creature::default()
        };

        assert!(criteria_from(&sample, &[]).is_empty());
    }

    // "legs" declares Int but the accessor reads text
    static MISWIRED: EntityDef = EntityDef {
        name: "Miswired",
        parent: None,
        key_attr: Some("id"),
        declared: &[AttrDef::new("legs", AttrKind::Int)],
    };

    struct Miswired {
        legs: String,
    }

    impl Persistent for Miswired {
        fn def() -> &'static EntityDef {
            &MISWIRED
        }

        fn accessors() -> &'static [Accessor<Self>] {
            static ACCESSORS: [Accessor<Miswired>; 1] =
                [Accessor::new("legs", |m: &Miswired| Value::from(m.legs.as_str()))];
            &ACCESSORS
        }

        fn key(&self) -> Option<Key> {
            None
        }

        fn assign_key(&mut self, _key: Key) {}

        fn from_record(record: &Record) -> ModelResult<Self> {
            Ok(Miswired {
                legs: record.text("legs")?,
            })
        }
    }

    #[test]
    fn kind_mismatch_is_skipped_not_fatal() {
        let sample = Miswired {
            legs: "four".to_string(),
        };

        assert!(criteria_from(&sample, &[]).is_empty());
    }

    static SHADOW_BASE: EntityDef = EntityDef {
        name: "ShadowBase",
        parent: None,
        key_attr: Some("id"),
        declared: &[AttrDef::new("label", AttrKind::Int)],
    };

    static SHADOW_LEAF: EntityDef = EntityDef {
        name: "ShadowLeaf",
        parent: Some(&SHADOW_BASE),
        key_attr: None,
        declared: &[AttrDef::new("label", AttrKind::Text)],
    };

    struct ShadowLeaf {
        label: String,
    }

    impl Persistent for ShadowLeaf {
        fn def() -> &'static EntityDef {
            &SHADOW_LEAF
        }

        fn accessors() -> &'static [Accessor<Self>] {
            static ACCESSORS: [Accessor<ShadowLeaf>; 1] = [Accessor::new("label", |s: &ShadowLeaf| {
                Value::from(s.label.as_str())
            })];
            &ACCESSORS
        }

        fn key(&self) -> Option<Key> {
            None
        }

        fn assign_key(&mut self, _key: Key) {}

        fn from_record(record: &Record) -> ModelResult<Self> {
            Ok(ShadowLeaf {
                label: record.text("label")?,
            })
        }
    }

    #[test]
    fn derived_declarations_shadow_base_ones() {
        let sample = ShadowLeaf {
            label: "x%".to_string(),
        };

        // the leaf's text declaration wins over the base's int one
        let criteria = criteria_from(&sample, &[]);
        assert_eq!(criteria.len(), 1);
        assert_eq!(criteria[0].op, CriterionOp::Like);
    }
}
