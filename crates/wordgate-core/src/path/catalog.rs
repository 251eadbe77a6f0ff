//! Ordered catalog of learning units and their gates.
//!
//! The catalog is read-only from the engine's point of view. Gate identity
//! is derived from each unit's grouping label exactly once, when the
//! catalog is built.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Bound;
use std::path::Path;
use tracing::warn;

use crate::economy::DEFAULT_GRADE;
use crate::error::{ConfigError, ValidationError};
use crate::milestone::CheckpointTest;
use crate::quiz::ChoiceQuestion;

pub type UnitId = i64;

/// Ordinal of a gate (chapter). Gates are ordered by ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GateId(pub u32);

impl GateId {
    pub fn ordinal(self) -> u32 {
        self.0
    }
}

impl fmt::Display for GateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gate {}", self.0)
    }
}

const GATE_KEYWORDS: [&str; 2] = ["CỬA", "GATE"];

/// Extract the gate ordinal from a grouping label such as
/// `"PHẦN 1, CỬA 3"` or `"Gate 2"`.
///
/// A keyword only counts at the start of a word and when a positive
/// integer follows it. Returns `None` when no occurrence qualifies; such
/// units are ungated.
pub fn parse_gate_ordinal(label: &str) -> Option<GateId> {
    let upper = label.to_uppercase();
    GATE_KEYWORDS.iter().find_map(|keyword| {
        upper.match_indices(keyword).find_map(|(idx, _)| {
            let starts_word = upper[..idx]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric());
            if !starts_word {
                return None;
            }
            let digits: String = upper[idx + keyword.len()..]
                .trim_start()
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            match digits.parse::<u32>() {
                Ok(n) if n > 0 => Some(GateId(n)),
                _ => None,
            }
        })
    })
}

/// A catalog entry ("lesson").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningUnit {
    pub id: UnitId,
    #[serde(default)]
    pub title: String,
    pub order_index: i64,
    /// Grouping label the gate is parsed from.
    #[serde(default)]
    pub group_label: Option<String>,
    /// Derived from `group_label` by [`Catalog::new`].
    #[serde(default)]
    pub gate: Option<GateId>,
    pub grade_level: String,
    pub xp_reward: u32,
}

impl LearningUnit {
    pub fn new(id: UnitId, order_index: i64, group_label: Option<&str>) -> Self {
        Self {
            id,
            title: String::new(),
            order_index,
            group_label: group_label.map(str::to_string),
            gate: group_label.and_then(parse_gate_ordinal),
            grade_level: DEFAULT_GRADE.to_string(),
            xp_reward: 15,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }
}

/// Units in their single global order, with a gate index.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    units: Vec<LearningUnit>,
    positions: HashMap<UnitId, usize>,
    gates: BTreeMap<GateId, Vec<usize>>,
}

impl Catalog {
    /// Build the catalog, sorting by `order_index`.
    ///
    /// # Errors
    /// Rejects duplicate unit ids and duplicate order indexes; either
    /// would make the global order ambiguous.
    pub fn new(mut units: Vec<LearningUnit>) -> Result<Self, ValidationError> {
        units.sort_by_key(|u| (u.order_index, u.id));

        for pair in units.windows(2) {
            if pair[0].order_index == pair[1].order_index {
                return Err(ValidationError::DuplicateOrder {
                    order_index: pair[0].order_index,
                    first: pair[0].id,
                    second: pair[1].id,
                });
            }
        }

        let mut positions = HashMap::with_capacity(units.len());
        let mut gates: BTreeMap<GateId, Vec<usize>> = BTreeMap::new();
        for (pos, unit) in units.iter_mut().enumerate() {
            if positions.insert(unit.id, pos).is_some() {
                return Err(ValidationError::DuplicateId {
                    collection: "unit".into(),
                    id: unit.id,
                });
            }
            unit.gate = unit.group_label.as_deref().and_then(parse_gate_ordinal);
            if let Some(gate) = unit.gate {
                gates.entry(gate).or_default().push(pos);
            }
        }

        for (gate, members) in &gates {
            let contiguous = members.windows(2).all(|w| w[1] == w[0] + 1);
            if !contiguous {
                warn!(%gate, "gate units are interleaved with other units in the global order");
            }
        }

        Ok(Self {
            units,
            positions,
            gates,
        })
    }

    pub fn units(&self) -> &[LearningUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn get(&self, id: UnitId) -> Option<&LearningUnit> {
        self.position(id).map(|pos| &self.units[pos])
    }

    pub fn position(&self, id: UnitId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn predecessor(&self, id: UnitId) -> Option<&LearningUnit> {
        let pos = self.position(id)?;
        pos.checked_sub(1).map(|p| &self.units[p])
    }

    pub fn successor(&self, id: UnitId) -> Option<&LearningUnit> {
        let pos = self.position(id)?;
        self.units.get(pos + 1)
    }

    pub fn gates(&self) -> impl Iterator<Item = GateId> + '_ {
        self.gates.keys().copied()
    }

    /// Units of `gate` in order; empty for an unknown gate.
    pub fn gate_units(&self, gate: GateId) -> Vec<&LearningUnit> {
        self.gates
            .get(&gate)
            .map(|members| members.iter().map(|&p| &self.units[p]).collect())
            .unwrap_or_default()
    }

    /// The gate with the next larger ordinal, skipping gaps.
    pub fn next_gate(&self, gate: GateId) -> Option<GateId> {
        self.gates
            .range((Bound::Excluded(gate), Bound::Unbounded))
            .next()
            .map(|(g, _)| *g)
    }

    pub fn first_unit_of(&self, gate: GateId) -> Option<&LearningUnit> {
        self.gates
            .get(&gate)
            .and_then(|members| members.first())
            .map(|&p| &self.units[p])
    }
}

fn default_grade() -> String {
    DEFAULT_GRADE.to_string()
}

fn default_unit_xp() -> u32 {
    15
}

/// One unit in a catalog file, with its quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSpec {
    pub id: UnitId,
    #[serde(default)]
    pub title: String,
    pub order_index: i64,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default = "default_grade")]
    pub grade_level: String,
    #[serde(default = "default_unit_xp")]
    pub xp_reward: u32,
    #[serde(default)]
    pub questions: Vec<ChoiceQuestion>,
}

impl UnitSpec {
    pub fn to_unit(&self) -> LearningUnit {
        LearningUnit {
            id: self.id,
            title: self.title.clone(),
            order_index: self.order_index,
            group_label: self.group.clone(),
            gate: self.group.as_deref().and_then(parse_gate_ordinal),
            grade_level: self.grade_level.clone(),
            xp_reward: self.xp_reward,
        }
    }
}

/// One checkpoint test in a catalog file, with its questions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSpec {
    #[serde(flatten)]
    pub test: CheckpointTest,
    #[serde(default)]
    pub questions: Vec<ChoiceQuestion>,
}

/// TOML hand-off format from the catalog collaborator.
///
/// ```toml
/// [[units]]
/// id = 1
/// order_index = 10101
/// group = "PHẦN 1, CỬA 1"
/// questions = [{ id = 1, correct_option = "A" }]
///
/// [[tests]]
/// id = 1
/// grade_level = "GRADE1"
/// after_units_completed = 5
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub units: Vec<UnitSpec>,
    #[serde(default)]
    pub tests: Vec<TestSpec>,
}

impl CatalogFile {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Validate the units as a catalog without keeping it.
    pub fn catalog(&self) -> Result<Catalog, ValidationError> {
        Catalog::new(self.units.iter().map(UnitSpec::to_unit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: UnitId, order: i64, label: &str) -> LearningUnit {
        LearningUnit::new(id, order, Some(label))
    }

    #[test]
    fn parses_vietnamese_gate_label() {
        assert_eq!(parse_gate_ordinal("PHẦN 1, CỬA 3"), Some(GateId(3)));
        assert_eq!(parse_gate_ordinal("phần 1, cửa 12"), Some(GateId(12)));
    }

    #[test]
    fn parses_english_gate_label() {
        assert_eq!(parse_gate_ordinal("Gate 2"), Some(GateId(2)));
        assert_eq!(parse_gate_ordinal("GATE4"), Some(GateId(4)));
    }

    #[test]
    fn label_without_ordinal_is_ungated() {
        assert_eq!(parse_gate_ordinal("Bonus lessons"), None);
        assert_eq!(parse_gate_ordinal("CỬA"), None);
        assert_eq!(parse_gate_ordinal("Gate 0"), None);
    }

    #[test]
    fn keyword_inside_a_word_is_ignored() {
        assert_eq!(parse_gate_ordinal("Delegate 2"), None);
        assert_eq!(parse_gate_ordinal("Tailgate 5"), None);
    }

    #[test]
    fn later_occurrence_with_ordinal_wins() {
        assert_eq!(parse_gate_ordinal("Gatekeeper, Gate 3"), Some(GateId(3)));
        assert_eq!(parse_gate_ordinal("Cửa sổ, CỬA 7"), Some(GateId(7)));
    }

    #[test]
    fn catalog_sorts_by_order_index() {
        let c = Catalog::new(vec![unit(3, 30, "Gate 1"), unit(1, 10, "Gate 1"), unit(2, 20, "Gate 1")])
            .unwrap();
        let ids: Vec<_> = c.units().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(c.predecessor(2).map(|u| u.id), Some(1));
        assert_eq!(c.successor(3), None);
        assert_eq!(c.predecessor(1), None);
    }

    #[test]
    fn duplicate_order_is_rejected() {
        let err = Catalog::new(vec![unit(1, 10, "Gate 1"), unit(2, 10, "Gate 1")]).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateOrder { order_index: 10, .. }));
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let err = Catalog::new(vec![unit(1, 10, "Gate 1"), unit(1, 20, "Gate 1")]).unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateId { id: 1, .. }));
    }

    #[test]
    fn gates_partition_and_skip_gaps() {
        let c = Catalog::new(vec![
            unit(1, 10, "CỬA 1"),
            unit(2, 20, "CỬA 1"),
            unit(3, 30, "CỬA 3"),
            LearningUnit::new(4, 40, None),
        ])
        .unwrap();
        assert_eq!(c.gates().collect::<Vec<_>>(), vec![GateId(1), GateId(3)]);
        assert_eq!(c.gate_units(GateId(1)).len(), 2);
        assert_eq!(c.next_gate(GateId(1)), Some(GateId(3)));
        assert_eq!(c.next_gate(GateId(3)), None);
        assert_eq!(c.first_unit_of(GateId(3)).map(|u| u.id), Some(3));
        assert_eq!(c.get(4).and_then(|u| u.gate), None);
    }

    #[test]
    fn gate_is_recomputed_from_label() {
        let mut u = unit(1, 10, "Gate 2");
        u.gate = Some(GateId(9));
        let c = Catalog::new(vec![u]).unwrap();
        assert_eq!(c.get(1).unwrap().gate, Some(GateId(2)));
    }

    #[test]
    fn catalog_file_parses() {
        let file = CatalogFile::from_toml_str(
            r#"
            [[units]]
            id = 1
            title = "Greetings"
            order_index = 10101
            group = "PHẦN 1, CỬA 1"
            questions = [{ id = 11, correct_option = "A" }]

            [[units]]
            id = 2
            order_index = 10102
            group = "PHẦN 1, CỬA 1"
            xp_reward = 20

            [[tests]]
            id = 1
            title = "Checkpoint"
            grade_level = "GRADE1"
            after_units_completed = 2
            questions = [{ id = 101, correct_option = "C" }]
            "#,
        )
        .unwrap();
        assert_eq!(file.units.len(), 2);
        assert_eq!(file.units[0].grade_level, "GRADE1");
        assert_eq!(file.units[0].xp_reward, 15);
        assert_eq!(file.units[1].xp_reward, 20);
        assert_eq!(file.tests[0].test.passing_score, 70);
        assert_eq!(file.tests[0].questions.len(), 1);
        let catalog = file.catalog().unwrap();
        assert_eq!(catalog.gate_units(GateId(1)).len(), 2);
    }
}
