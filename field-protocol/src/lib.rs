use serde::{Deserialize, Serialize};

pub const GAME_STATE_FILE: &str = "game.json";

/// One snapshot of the match as published by the field server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    #[serde(default)]
    pub game_on: bool,
    #[serde(default)]
    pub time_left: f32,
    #[serde(default)]
    pub robots: Vec<RobotRecord>,
    #[serde(default)]
    pub team1: Option<TeamInfo>,
    #[serde(default)]
    pub team2: Option<TeamInfo>,
    #[serde(default)]
    pub field: Option<FieldInfo>,
}

/// A robot marker seen by the field camera.
///
/// `position` and `direction` are missing when the marker is not visible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotRecord {
    pub id: u32,
    #[serde(default)]
    pub position: Option<Vec<f32>>,
    #[serde(default)]
    pub direction: Option<f32>,
}

impl RobotRecord {
    /// Planar position, if the record carries at least two coordinates.
    pub fn xy(&self) -> Option<[f32; 2]> {
        match self.position.as_deref() {
            Some([x, y, ..]) => Some([*x, *y]),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamInfo {
    pub id: u32,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamTag {
    Team1,
    Team2,
}

impl TeamTag {
    pub fn opponent(self) -> Self {
        match self {
            Self::Team1 => Self::Team2,
            Self::Team2 => Self::Team1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Team1 => "team1",
            Self::Team2 => "team2",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldInfo {
    #[serde(default)]
    pub baskets: Baskets,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Baskets {
    pub team1: Option<Basket>,
    pub team2: Option<Basket>,
}

impl Baskets {
    pub fn of(&self, team: TeamTag) -> Option<&Basket> {
        match team {
            TeamTag::Team1 => self.team1.as_ref(),
            TeamTag::Team2 => self.team2.as_ref(),
        }
    }
}

/// Corners of a basket in field millimetres.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Basket {
    pub top_left: [f32; 2],
    pub top_right: [f32; 2],
    pub bottom_left: [f32; 2],
    pub bottom_right: [f32; 2],
}

impl GameSnapshot {
    /// Finds the record for `robot_id`, if the camera reported it at all.
    pub fn robot(&self, robot_id: u32) -> Option<&RobotRecord> {
        self.robots.iter().find(|r| r.id == robot_id)
    }

    /// Which side of the match `robot_id` plays on.
    pub fn team_of(&self, robot_id: u32) -> Option<TeamTag> {
        if self.team1.as_ref().is_some_and(|t| t.id == robot_id) {
            Some(TeamTag::Team1)
        } else if self.team2.as_ref().is_some_and(|t| t.id == robot_id) {
            Some(TeamTag::Team2)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "gameOn": true,
        "timeLeft": 87.5,
        "robots": [
            {"id": 10, "position": [1200.0, 800.5, 0.0], "direction": 45.0},
            {"id": 7, "position": null, "direction": null}
        ],
        "team1": {"id": 7, "name": "Sedmica"},
        "team2": {"id": 10, "name": "Desetka"},
        "field": {
            "baskets": {
                "team1": {"topLeft": [0, 1000], "topRight": [500, 1000], "bottomLeft": [0, 0], "bottomRight": [500, 0]},
                "team2": {"topLeft": [3000, 1000], "topRight": [3500, 1000], "bottomLeft": [3000, 0], "bottomRight": [3500, 0]}
            },
            "unknown": 1
        }
    }"#;

    #[test]
    fn decodes_server_snapshot() {
        let snapshot: GameSnapshot = serde_json::from_str(SAMPLE).unwrap();
        assert!(snapshot.game_on);
        assert_eq!(snapshot.time_left, 87.5);
        assert_eq!(snapshot.robots.len(), 2);

        let me = snapshot.robot(10).unwrap();
        assert_eq!(me.xy(), Some([1200.0, 800.5]));
        assert_eq!(me.direction, Some(45.0));

        let hidden = snapshot.robot(7).unwrap();
        assert_eq!(hidden.xy(), None);
        assert!(snapshot.robot(3).is_none());
    }

    #[test]
    fn resolves_team_and_baskets() {
        let snapshot: GameSnapshot = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(snapshot.team_of(10), Some(TeamTag::Team2));
        assert_eq!(snapshot.team_of(7), Some(TeamTag::Team1));
        assert_eq!(snapshot.team_of(99), None);

        let baskets = &snapshot.field.as_ref().unwrap().baskets;
        let own = baskets.of(TeamTag::Team2).unwrap();
        assert_eq!(own.bottom_right, [3500.0, 0.0]);
        assert_eq!(TeamTag::Team2.opponent(), TeamTag::Team1);
    }

    #[test]
    fn missing_fields_default() {
        let snapshot: GameSnapshot = serde_json::from_str("{}").unwrap();
        assert!(!snapshot.game_on);
        assert!(snapshot.robots.is_empty());
        assert!(snapshot.field.is_none());
    }

    #[test]
    fn short_position_is_not_a_position() {
        let record: RobotRecord =
            serde_json::from_str(r#"{"id": 1, "position": [5.0], "direction": 0.0}"#).unwrap();
        assert_eq!(record.xy(), None);
    }
}
