use crate::Direction;
use replay_data::Location;
use serde::{Deserialize, Serialize};

/// One reconstructed battle action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    Deploy {
        name: String,
        location: Location,
        direction: Direction,
    },
    Retreat {
        location: Location,
    },
}

/// Append-only record of the actions recognized in one battle
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    stage_name: String,
    roster: Vec<String>,
    events: Vec<Event>,
}

impl EventLog {
    pub fn new(stage_name: &str, roster: Vec<String>) -> Self {
        Self {
            stage_name: stage_name.to_string(),
            roster,
            events: Vec::new(),
        }
    }

    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    pub fn roster(&self) -> &[String] {
        &self.roster
    }

    pub fn into_document(self, minimum_required: &str, details: String) -> CopilotDocument {
        CopilotDocument {
            doc: DocInfo {
                title: format!("Replay - {}", self.stage_name),
                details,
            },
            opers: self
                .roster
                .into_iter()
                .map(|name| OperUsage {
                    name,
                    skill: 0,
                    skill_usage: 0,
                })
                .collect(),
            stage_name: self.stage_name,
            minimum_required: minimum_required.to_string(),
            actions: self.events,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocInfo {
    pub title: String,
    pub details: String,
}

/// Roster entry in the output document; skills are never recognized, so always unused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperUsage {
    pub name: String,
    pub skill: u8,
    pub skill_usage: u8,
}

/// The action document written once a recording has been fully analyzed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopilotDocument {
    pub stage_name: String,
    pub minimum_required: String,
    pub doc: DocInfo,
    pub opers: Vec<OperUsage>,
    pub actions: Vec<Event>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_json_shape() {
        let mut log = EventLog::new("1-7", vec!["A".into(), "B".into()]);
        log.push(Event::Deploy {
            name: "A".into(),
            location: Location::new(2, 3),
            direction: Direction::Up,
        });
        log.push(Event::Retreat {
            location: Location::new(2, 3),
        });

        let doc = log.into_document("v4.0.0", "built".into());
        let value = serde_json::to_value(&doc).unwrap();
        assert_eq!(value["stage_name"], "1-7");
        assert_eq!(value["minimum_required"], "v4.0.0");
        assert_eq!(value["doc"]["title"], "Replay - 1-7");
        assert_eq!(
            value["opers"][1],
            json!({"name": "B", "skill": 0, "skill_usage": 0})
        );
        assert_eq!(
            value["actions"],
            json!([
                {"type": "Deploy", "name": "A", "location": [2, 3], "direction": 3},
                {"type": "Retreat", "location": [2, 3]}
            ])
        );
    }

    #[test]
    fn test_document_parses_back() {
        let text = r#"{"stage_name":"1-7","minimum_required":"v4.0.0",
            "doc":{"title":"t","details":"d"},"opers":[],
            "actions":[{"type":"Deploy","name":"A","location":[4,1],"direction":0}]}"#;
        let doc: CopilotDocument = serde_json::from_str(text).unwrap();
        assert_eq!(
            doc.actions,
            vec![Event::Deploy {
                name: "A".into(),
                location: Location::new(4, 1),
                direction: Direction::Right,
            }]
        );
    }
}
