//! JSON bodies exchanged with the planning/vision backend

use rover_shared::{Obstacle, Pose};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Obstacle as the planner expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannerObstacle {
    pub id: u32,
    pub x: i32,
    pub y: i32,
    pub d: i32,
}

impl From<&Obstacle> for PlannerObstacle {
    fn from(o: &Obstacle) -> Self {
        Self {
            id: o.id,
            x: o.x,
            y: o.y,
            d: o.d,
        }
    }
}

/// Body of `POST /path`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathRequest {
    pub obstacles: Vec<PlannerObstacle>,
    pub mode: String,
    pub retrying: bool,
    pub robot_x: i32,
    pub robot_y: i32,
    pub robot_dir: i32,
}

impl PathRequest {
    pub fn new(obstacles: &[Obstacle], mode: &str, robot: Pose) -> Self {
        Self {
            obstacles: obstacles.iter().map(PlannerObstacle::from).collect(),
            mode: mode.to_string(),
            retrying: false,
            robot_x: robot.x,
            robot_y: robot.y,
            robot_dir: robot.d,
        }
    }
}

/// Waypoint of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PathPoint {
    pub x: i32,
    pub y: i32,
    pub d: i32,
}

impl From<PathPoint> for Pose {
    fn from(p: PathPoint) -> Self {
        Pose::new(p.x, p.y, p.d)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlanData {
    pub commands: Vec<String>,
    pub path: Vec<PathPoint>,
}

/// Success body of `POST /path`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlanResponse {
    pub data: PlanData,
}

/// Body of `POST /image`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Recognition {
    #[serde(default, deserialize_with = "string_or_number")]
    pub image_id: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub symbol: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub obstacle_id: String,
}

/// Image id the recogniser returns when it found nothing
pub const NOT_RECOGNIZED: &str = "NA";

impl Recognition {
    pub fn is_recognized(&self) -> bool {
        !self.image_id.is_empty() && self.image_id != NOT_RECOGNIZED && !self.symbol.is_empty()
    }
}

// Recognisers disagree on whether ids are strings or numbers
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}
