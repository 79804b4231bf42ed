// Static game data: maps, champion and troop definitions. Read-only after load.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::config::*;
use super::geometry::{Rect, Vector2};
use super::grid::{GridJson, MapGrid};
use crate::error::SetupError;

/// Player seat index within a match.
pub type Slot = i16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChampionKind {
    MeleeAxe,
    AssassinSword,
    MarksmanCrossbow,
    MageScepter,
}

impl ChampionKind {
    pub const ALL: [ChampionKind; 4] = [
        ChampionKind::MeleeAxe,
        ChampionKind::AssassinSword,
        ChampionKind::MarksmanCrossbow,
        ChampionKind::MageScepter,
    ];

    pub fn code(self) -> u8 {
        match self {
            ChampionKind::MeleeAxe => CHAMPION_MELEE_AXE,
            ChampionKind::AssassinSword => CHAMPION_ASSASSIN_SWORD,
            ChampionKind::MarksmanCrossbow => CHAMPION_MARKSMAN_CROSSBOW,
            ChampionKind::MageScepter => CHAMPION_MAGE_SCEPTER,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }

    pub fn label(self) -> &'static str {
        match self {
            ChampionKind::MeleeAxe => "melee_axe",
            ChampionKind::AssassinSword => "assassin_sword",
            ChampionKind::MarksmanCrossbow => "marksman_crossbow",
            ChampionKind::MageScepter => "mage_scepter",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChampionDef {
    pub kind: ChampionKind,
    pub name: String,
    pub hp: i32,
    pub defense: i32,
    pub damage: i32,
    pub attack_speed: f32,
    pub attack_range: f32,
    pub move_speed: f32,
    pub gold_mine_damage: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TroopDef {
    pub id: i16,
    pub name: String,
    pub hp: i32,
    pub defense: i32,
    pub damage: i32,
    pub attack_speed: f32,
    pub attack_range: f32,
    pub detection_range: f32,
    pub move_speed: f32,
    pub cost: i32,
    #[serde(default)]
    pub gold_mine_damage: i32,
}

/// Stats for a stationary structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingDef {
    pub position: Vector2,
    pub width: f32,
    pub length: f32,
    pub hp: i32,
    pub defense: i32,
    #[serde(default)]
    pub damage: i32,
    #[serde(default)]
    pub attack_speed: f32,
    #[serde(default)]
    pub attack_range: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotInfo {
    pub slot: Slot,
    pub champion_spawn: Vector2,
    pub troop_spawn: Vector2,
    #[serde(default)]
    pub starting_gold: i32,
    pub burg: BuildingDef,
    #[serde(default)]
    pub towers: Vec<BuildingDef>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GoldMineProfile {
    pub capacity: i32,
    pub hp: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldMineRules {
    pub interval_seconds: f64,
    pub max_mines: usize,
    pub small: GoldMineProfile,
    pub large: GoldMineProfile,
}

/// Map geometry plus the per-slot layout and economy parameters.
#[derive(Debug, Clone)]
pub struct GameMap {
    pub id: String,
    pub grid: MapGrid,
    pub playground: Rect,
    pub gold_per_second: f64,
    pub gold_mines: GoldMineRules,
    pub champion_respawn_seconds: f64,
    pub slots: Vec<SlotInfo>,
}

// --- JSON deserialization helpers ---

#[derive(Deserialize)]
struct MapJson {
    id: String,
    grid: GridJson,
    playground: Rect,
    gold_per_second: f64,
    gold_mines: GoldMineRules,
    #[serde(default = "default_respawn_seconds")]
    champion_respawn_seconds: f64,
    slots: Vec<SlotInfo>,
}

fn default_respawn_seconds() -> f64 {
    10.0
}

impl GameMap {
    pub fn from_json(json: &str) -> Result<Self, SetupError> {
        let raw: MapJson = serde_json::from_str(json)?;
        let grid = MapGrid::from_json(raw.grid).map_err(SetupError::InvalidMap)?;

        if raw.slots.is_empty() {
            return Err(SetupError::InvalidMap(format!("map '{}' has no slots", raw.id)));
        }
        let mut seen = std::collections::HashSet::new();
        for info in &raw.slots {
            if !seen.insert(info.slot) {
                return Err(SetupError::DuplicateSlot(info.slot));
            }
            if !grid.contains_position(info.champion_spawn) {
                return Err(SetupError::InvalidMap(format!(
                    "slot {} champion spawn lies outside the grid",
                    info.slot
                )));
            }
        }

        Ok(GameMap {
            id: raw.id,
            grid,
            playground: raw.playground,
            gold_per_second: raw.gold_per_second,
            gold_mines: raw.gold_mines,
            champion_respawn_seconds: raw.champion_respawn_seconds,
            slots: raw.slots,
        })
    }

    pub fn slot_info(&self, slot: Slot) -> Option<&SlotInfo> {
        self.slots.iter().find(|s| s.slot == slot)
    }

    /// Two-slot 40x40 arena used when no data directory is configured.
    pub fn builtin_arena() -> Self {
        let mut grid = MapGrid::open(40, 40, 1.0);
        // Two wall segments flanking the centre lane.
        for i in 14..18 {
            grid.set_walkable(super::grid::GridCell::new(i, 24), false);
            grid.set_walkable(super::grid::GridCell::new(40 - 1 - i, 15), false);
        }

        let tower = |x: f32, y: f32| BuildingDef {
            position: Vector2::new(x, y),
            width: 2.0,
            length: 2.0,
            hp: 2000,
            defense: 50,
            damage: 100,
            attack_speed: 1.0,
            attack_range: 5.0,
        };
        let burg = |x: f32, y: f32| BuildingDef {
            position: Vector2::new(x, y),
            width: 4.0,
            length: 4.0,
            hp: 5000,
            defense: 60,
            damage: 60,
            attack_speed: 0.8,
            attack_range: 4.0,
        };

        GameMap {
            id: "arena".to_string(),
            grid,
            playground: Rect {
                center: Vector2::new(20.0, 20.0),
                length: 10.0,
                width: 10.0,
            },
            gold_per_second: 2.0,
            gold_mines: GoldMineRules {
                interval_seconds: 30.0,
                max_mines: 3,
                small: GoldMineProfile {
                    capacity: 100,
                    hp: 400,
                },
                large: GoldMineProfile {
                    capacity: 250,
                    hp: 900,
                },
            },
            champion_respawn_seconds: 10.0,
            slots: vec![
                SlotInfo {
                    slot: 0,
                    champion_spawn: Vector2::new(8.5, 8.5),
                    troop_spawn: Vector2::new(7.5, 5.5),
                    starting_gold: 100,
                    burg: burg(4.0, 4.0),
                    towers: vec![tower(12.0, 12.0), tower(4.0, 14.0)],
                },
                SlotInfo {
                    slot: 1,
                    champion_spawn: Vector2::new(31.5, 31.5),
                    troop_spawn: Vector2::new(32.5, 34.5),
                    starting_gold: 100,
                    burg: burg(36.0, 36.0),
                    towers: vec![tower(28.0, 28.0), tower(36.0, 26.0)],
                },
            ],
        }
    }
}

/// Catalog of maps, champions and troops consulted at match setup.
#[derive(Debug, Clone, Default)]
pub struct GameData {
    maps: HashMap<String, Arc<GameMap>>,
    champions: HashMap<ChampionKind, ChampionDef>,
    troops: HashMap<i16, TroopDef>,
}

impl GameData {
    pub fn builtin() -> Self {
        let mut data = GameData::default();
        data.insert_map(GameMap::builtin_arena());
        for def in builtin_champions() {
            data.champions.insert(def.kind, def);
        }
        for def in builtin_troops() {
            data.troops.insert(def.id, def);
        }
        data
    }

    /// Load `maps/*.json`, `champions.json` and `troops.json` from `dir`.
    /// Missing champion or troop files fall back to the built-in tables.
    pub fn load_dir(dir: &Path) -> Result<Self, SetupError> {
        let mut data = GameData::default();

        let maps_dir = dir.join("maps");
        let mut paths: Vec<_> = std::fs::read_dir(&maps_dir)?
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        paths.sort();
        for path in paths {
            let contents = std::fs::read_to_string(&path)?;
            let map = GameMap::from_json(&contents)?;
            tracing::info!(map_id = %map.id, path = %path.display(), "Loaded map");
            data.insert_map(map);
        }

        let champions: Vec<ChampionDef> = match std::fs::read_to_string(dir.join("champions.json")) {
            Ok(s) => serde_json::from_str(&s)?,
            Err(_) => builtin_champions(),
        };
        for def in champions {
            data.champions.insert(def.kind, def);
        }

        let troops: Vec<TroopDef> = match std::fs::read_to_string(dir.join("troops.json")) {
            Ok(s) => serde_json::from_str(&s)?,
            Err(_) => builtin_troops(),
        };
        for def in troops {
            data.troops.insert(def.id, def);
        }

        Ok(data)
    }

    pub fn insert_map(&mut self, map: GameMap) {
        self.maps.insert(map.id.clone(), Arc::new(map));
    }

    pub fn map(&self, id: &str) -> Result<Arc<GameMap>, SetupError> {
        self.maps
            .get(id)
            .cloned()
            .ok_or_else(|| SetupError::UnknownMap(id.to_string()))
    }

    pub fn champion(&self, kind: ChampionKind) -> Result<&ChampionDef, SetupError> {
        self.champions
            .get(&kind)
            .ok_or_else(|| SetupError::UnknownChampion(kind.label().to_string()))
    }

    pub fn troop(&self, id: i16) -> Option<&TroopDef> {
        self.troops.get(&id)
    }

    pub fn map_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.maps.keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn builtin_champions() -> Vec<ChampionDef> {
    vec![
        ChampionDef {
            kind: ChampionKind::MeleeAxe,
            name: "Axe Warden".into(),
            hp: 1200,
            defense: 40,
            damage: 80,
            attack_speed: 1.0,
            attack_range: 1.5,
            move_speed: 4.0,
            gold_mine_damage: 50,
        },
        ChampionDef {
            kind: ChampionKind::AssassinSword,
            name: "Shade Blade".into(),
            hp: 900,
            defense: 20,
            damage: 110,
            attack_speed: 1.25,
            attack_range: 1.2,
            move_speed: 5.0,
            gold_mine_damage: 50,
        },
        ChampionDef {
            kind: ChampionKind::MarksmanCrossbow,
            name: "Bolt Ranger".into(),
            hp: 800,
            defense: 15,
            damage: 90,
            attack_speed: 1.0,
            attack_range: 6.0,
            move_speed: 4.0,
            gold_mine_damage: 40,
        },
        ChampionDef {
            kind: ChampionKind::MageScepter,
            name: "Ember Sage".into(),
            hp: 850,
            defense: 15,
            damage: 70,
            attack_speed: 0.8,
            attack_range: 5.0,
            move_speed: 3.8,
            gold_mine_damage: 40,
        },
    ]
}

fn builtin_troops() -> Vec<TroopDef> {
    vec![
        TroopDef {
            id: 0,
            name: "Swordsman".into(),
            hp: 400,
            defense: 10,
            damage: 40,
            attack_speed: 1.0,
            attack_range: 1.2,
            detection_range: 6.0,
            move_speed: 3.0,
            cost: 50,
            gold_mine_damage: 0,
        },
        TroopDef {
            id: 1,
            name: "Archer".into(),
            hp: 300,
            defense: 5,
            damage: 35,
            attack_speed: 1.0,
            attack_range: 5.0,
            detection_range: 7.0,
            move_speed: 3.0,
            cost: 70,
            gold_mine_damage: 0,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_data_is_complete() {
        let data = GameData::builtin();
        let map = data.map("arena").unwrap();
        assert_eq!(map.slots.len(), 2);
        for kind in ChampionKind::ALL {
            assert!(data.champion(kind).is_ok());
        }
        assert!(data.troop(0).is_some());
        assert!(data.troop(42).is_none());
    }

    #[test]
    fn test_builtin_spawns_are_walkable() {
        let map = GameMap::builtin_arena();
        for info in &map.slots {
            assert!(map.grid.is_walkable_position(info.champion_spawn));
            assert!(map.grid.is_walkable_position(info.troop_spawn));
        }
    }

    #[test]
    fn test_missing_map_is_setup_error() {
        let data = GameData::builtin();
        assert!(matches!(data.map("nowhere"), Err(SetupError::UnknownMap(_))));
    }

    #[test]
    fn test_champion_codes_round_trip() {
        for kind in ChampionKind::ALL {
            assert_eq!(ChampionKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ChampionKind::from_code(9), None);
    }

    #[test]
    fn test_map_from_json() {
        let json = r#"{
            "id": "duel",
            "grid": {"rows": 10, "cols": 10},
            "playground": {"center": {"x": 5, "y": 5}, "length": 4, "width": 4},
            "gold_per_second": 1.5,
            "gold_mines": {
                "interval_seconds": 20, "max_mines": 2,
                "small": {"capacity": 10, "hp": 100},
                "large": {"capacity": 30, "hp": 300}
            },
            "slots": [
                {"slot": 0, "champion_spawn": {"x": 1.5, "y": 1.5}, "troop_spawn": {"x": 2.5, "y": 1.5},
                 "burg": {"position": {"x": 1, "y": 1}, "width": 2, "length": 2, "hp": 1000, "defense": 10}},
                {"slot": 1, "champion_spawn": {"x": 8.5, "y": 8.5}, "troop_spawn": {"x": 7.5, "y": 8.5},
                 "burg": {"position": {"x": 9, "y": 9}, "width": 2, "length": 2, "hp": 1000, "defense": 10}}
            ]
        }"#;
        let map = GameMap::from_json(json).unwrap();
        assert_eq!(map.id, "duel");
        assert_eq!(map.champion_respawn_seconds, 10.0);
        assert!(map.slot_info(1).is_some());
        assert!(map.slot_info(2).is_none());
    }

    #[test]
    fn test_map_from_json_rejects_duplicate_slots() {
        let json = r#"{
            "id": "dup",
            "grid": {"rows": 4, "cols": 4},
            "playground": {"center": {"x": 2, "y": 2}, "length": 1, "width": 1},
            "gold_per_second": 1,
            "gold_mines": {"interval_seconds": 1, "max_mines": 1,
                "small": {"capacity": 1, "hp": 1}, "large": {"capacity": 1, "hp": 1}},
            "slots": [
                {"slot": 0, "champion_spawn": {"x": 1, "y": 1}, "troop_spawn": {"x": 1, "y": 1},
                 "burg": {"position": {"x": 1, "y": 1}, "width": 1, "length": 1, "hp": 1, "defense": 0}},
                {"slot": 0, "champion_spawn": {"x": 2, "y": 2}, "troop_spawn": {"x": 2, "y": 2},
                 "burg": {"position": {"x": 2, "y": 2}, "width": 1, "length": 1, "hp": 1, "defense": 0}}
            ]
        }"#;
        assert!(matches!(GameMap::from_json(json), Err(SetupError::DuplicateSlot(0))));
    }
}
