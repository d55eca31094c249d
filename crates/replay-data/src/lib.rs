use anyhow::{Context, Result};
use replay_capture::Point;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Unit class as shown by the deployment tray icon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Caster,
    Medic,
    Pioneer,
    Sniper,
    Special,
    Support,
    Tank,
    Warrior,
    Drone,
    Unknown,
}

/// Grid coordinate of a tile on the stage map. Serializes as `[x, y]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[i32; 2]", into = "[i32; 2]")]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<[i32; 2]> for Location {
    fn from([x, y]: [i32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Location> for [i32; 2] {
    fn from(l: Location) -> Self {
        [l.x, l.y]
    }
}

/// A deployable tile and where its base point lands in a canonical frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub loc: Location,
    pub pos: Point,
}

/// Static unit data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitData {
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub rarity: u8,
}

/// Units whose tray icon may show a role other than their listed one.
const DEFAULT_EXTRA_ROLES: &[(&str, Role)] = &[("阿米娅", Role::Warrior)];

/// Raw units.json file format
#[derive(Debug, Deserialize)]
struct UnitsFile {
    units: Vec<UnitData>,
    #[serde(default)]
    extra_roles: HashMap<String, Vec<Role>>,
}

/// Raw tiles.json file format
#[derive(Debug, Deserialize)]
struct TilesFile {
    stages: HashMap<String, Vec<Tile>>,
}

/// Game data registry: unit roles and rarities, stage tile geometry
#[derive(Debug, Clone)]
pub struct GameData {
    pub units: HashMap<String, UnitData>,
    pub stages: HashMap<String, Vec<Tile>>,
    pub extra_roles: HashMap<String, Vec<Role>>,
}

impl Default for GameData {
    fn default() -> Self {
        let extra_roles = DEFAULT_EXTRA_ROLES
            .iter()
            .map(|(name, role)| (name.to_string(), vec![*role]))
            .collect();
        Self {
            units: HashMap::new(),
            stages: HashMap::new(),
            extra_roles,
        }
    }
}

impl GameData {
    /// Load unit and tile data from the data directory.
    /// Expects:
    ///   - data_dir/units.json
    ///   - data_dir/tiles.json
    pub fn load(data_dir: &Path) -> Result<Self> {
        let mut data = Self::default();

        let units_path = data_dir.join("units.json");
        if units_path.exists() {
            let content =
                std::fs::read_to_string(&units_path).context("Failed to read units.json")?;
            let file: UnitsFile =
                serde_json::from_str(&content).context("Failed to parse units.json")?;
            for unit in file.units {
                data.units.insert(unit.name.clone(), unit);
            }
            for (name, roles) in file.extra_roles {
                data.extra_roles.entry(name).or_default().extend(roles);
            }
            tracing::info!("Loaded {} units", data.units.len());
        } else {
            tracing::warn!("No units.json found at {}", units_path.display());
        }

        let tiles_path = data_dir.join("tiles.json");
        if tiles_path.exists() {
            let content =
                std::fs::read_to_string(&tiles_path).context("Failed to read tiles.json")?;
            let file: TilesFile =
                serde_json::from_str(&content).context("Failed to parse tiles.json")?;
            data.stages = file.stages;
            tracing::info!("Loaded tile geometry for {} stages", data.stages.len());
        } else {
            tracing::warn!("No tiles.json found at {}", tiles_path.display());
        }

        Ok(data)
    }

    pub fn insert_unit(&mut self, name: &str, role: Role, rarity: u8) {
        self.units.insert(
            name.to_string(),
            UnitData {
                name: name.to_string(),
                role,
                rarity,
            },
        );
    }

    pub fn insert_stage(&mut self, name: &str, tiles: Vec<Tile>) {
        self.stages.insert(name.to_string(), tiles);
    }

    pub fn role(&self, name: &str) -> Role {
        self.units.get(name).map(|u| u.role).unwrap_or(Role::Unknown)
    }

    pub fn rarity(&self, name: &str) -> u8 {
        self.units.get(name).map(|u| u.rarity).unwrap_or(0)
    }

    /// The unit's own role plus any listed exceptions.
    pub fn compatible_roles(&self, name: &str) -> Vec<Role> {
        let mut roles = vec![self.role(name)];
        for role in self.extra_roles.get(name).into_iter().flatten() {
            if !roles.contains(role) {
                roles.push(*role);
            }
        }
        roles
    }

    pub fn has_stage(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    pub fn tiles(&self, stage: &str) -> Option<&[Tile]> {
        self.stages.get(stage).map(|t| t.as_slice())
    }
}
