//! Static Data Tables
//!
//! Weapon, ammunition and spell definitions plus the experience curve.
//! Tables are immutable after construction; the simulation holds them
//! behind an `Arc` and never writes to them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Experience cap per skill.
pub const XP_CAP: u64 = 200_000_000;

/// Highest attainable skill level.
pub const MAX_LEVEL: u32 = 99;

/// Cumulative experience thresholds for levels 1-99.
///
/// `XP_TABLE[level - 1]` is the experience required to hold `level`.
pub const XP_TABLE: [u64; 99] = [
    0, 83, 174, 276, 388, 512, 650, 801, 969, 1154, 1358, 1584, 1833, 2107, 2411, 2746, 3115,
    3523, 3973, 4470, 5018, 5624, 6291, 7028, 7842, 8740, 9730, 10824, 12031, 13363, 14833,
    16456, 18247, 20224, 22406, 24815, 27473, 30408, 33648, 37224, 41171, 45529, 50339, 55649,
    61512, 67983, 75127, 83014, 91721, 101333, 111945, 123660, 136594, 150872, 166636, 184040,
    203254, 224466, 247886, 273742, 302288, 333804, 368599, 407015, 449428, 496254, 547953,
    605032, 668051, 737627, 814445, 899257, 992895, 1096278, 1210421, 1336443, 1475581, 1629200,
    1798808, 1986068, 2192818, 2421087, 2673114, 2951373, 3258594, 3597792, 3972294, 4385776,
    4842295, 5346332, 5902831, 6517253, 7195629, 7944614, 8771558, 9684577, 10692629, 11805606,
    13034431,
];

/// Level held at a given amount of experience.
pub fn level_for_xp(xp: u64) -> u32 {
    // Highest threshold not exceeding xp
    let mut level = 1;
    for (i, threshold) in XP_TABLE.iter().enumerate() {
        if xp >= *threshold {
            level = (i + 1) as u32;
        } else {
            break;
        }
    }
    level
}

/// Experience required to hold a level (clamped to 1-99).
pub fn xp_for_level(level: u32) -> u64 {
    let level = level.clamp(1, MAX_LEVEL) as usize;
    XP_TABLE[level - 1]
}

/// Combat style a weapon or spell attacks with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatStyle {
    /// Close-quarters melee.
    Melee,
    /// Projectile attacks consuming ammunition.
    Ranged,
    /// Spell attacks consuming runes.
    Magic,
}

/// Kind of ammunition a ranged weapon fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmmoKind {
    /// Arrows, fired by bows.
    Arrow,
    /// Bolts, fired by crossbows.
    Bolt,
}

/// A stack of items, used for rune costs and ammunition checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Item identifier.
    pub item: u32,
    /// Quantity required or held.
    pub quantity: u32,
}

impl ItemStack {
    /// Create a new stack.
    pub const fn new(item: u32, quantity: u32) -> Self {
        Self { item, quantity }
    }
}

/// Weapon definition.
#[derive(Debug, Clone, Serialize)]
pub struct WeaponDef {
    /// Item identifier.
    pub id: u32,
    /// Display name.
    pub name: &'static str,
    /// Combat style this weapon attacks with.
    pub style: CombatStyle,
    /// Attack speed in 600 ms combat rounds.
    pub speed_rounds: u64,
    /// Level required in the style's governing skill.
    pub level_req: u32,
    /// Ammunition kind consumed per shot (ranged weapons only).
    pub ammo_kind: Option<AmmoKind>,
}

/// Ammunition definition.
#[derive(Debug, Clone, Serialize)]
pub struct AmmoDef {
    /// Item identifier.
    pub id: u32,
    /// Display name.
    pub name: &'static str,
    /// Ranged strength bonus contributed to the max hit.
    pub ranged_strength: i32,
    /// Ammunition kind.
    pub kind: AmmoKind,
}

/// Spell definition.
#[derive(Debug, Clone, Serialize)]
pub struct SpellDef {
    /// Spell identifier.
    pub id: u32,
    /// Display name.
    pub name: &'static str,
    /// Magic level required to cast.
    pub level_req: u32,
    /// Base max hit before magic damage bonuses.
    pub base_max_hit: u32,
    /// Magic experience granted per cast.
    pub xp: u32,
    /// Rune cost per cast.
    pub runes: Vec<ItemStack>,
}

/// Stat a prayer boosts while active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrayerBoost {
    /// Melee accuracy.
    Attack,
    /// Melee damage.
    Strength,
    /// Defence rolls.
    Defence,
    /// Ranged accuracy and damage.
    Ranged,
    /// Magic accuracy.
    Magic,
}

/// Prayer definition.
#[derive(Debug, Clone, Serialize)]
pub struct PrayerDef {
    /// Prayer identifier.
    pub id: u32,
    /// Display name.
    pub name: &'static str,
    /// Stat the prayer boosts.
    pub boost: PrayerBoost,
    /// Effective-level multiplier while active.
    pub multiplier: f64,
    /// Prayer level required to activate.
    pub level_req: u32,
}

// Rune item identifiers
/// Air rune item id.
pub const AIR_RUNE: u32 = 556;
/// Mind rune item id.
pub const MIND_RUNE: u32 = 558;
/// Chaos rune item id.
pub const CHAOS_RUNE: u32 = 562;
/// Fire rune item id.
pub const FIRE_RUNE: u32 = 554;

/// All static tables, bundled for shared read-only access.
#[derive(Debug, Clone)]
pub struct StaticTables {
    weapons: BTreeMap<u32, WeaponDef>,
    ammo: BTreeMap<u32, AmmoDef>,
    spells: BTreeMap<u32, SpellDef>,
    prayers: BTreeMap<u32, PrayerDef>,
}

impl StaticTables {
    /// Build the shipping table set.
    pub fn builtin() -> Self {
        let weapons = [
            WeaponDef {
                id: 1,
                name: "Bronze sword",
                style: CombatStyle::Melee,
                speed_rounds: 4,
                level_req: 1,
                ammo_kind: None,
            },
            WeaponDef {
                id: 2,
                name: "Rune scimitar",
                style: CombatStyle::Melee,
                speed_rounds: 4,
                level_req: 40,
                ammo_kind: None,
            },
            WeaponDef {
                id: 3,
                name: "Shortbow",
                style: CombatStyle::Ranged,
                speed_rounds: 5,
                level_req: 1,
                ammo_kind: Some(AmmoKind::Arrow),
            },
            WeaponDef {
                id: 4,
                name: "Maple shortbow",
                style: CombatStyle::Ranged,
                speed_rounds: 4,
                level_req: 30,
                ammo_kind: Some(AmmoKind::Arrow),
            },
            WeaponDef {
                id: 5,
                name: "Staff of air",
                style: CombatStyle::Magic,
                speed_rounds: 5,
                level_req: 1,
                ammo_kind: None,
            },
        ];

        let ammo = [
            AmmoDef {
                id: 882,
                name: "Bronze arrow",
                ranged_strength: 7,
                kind: AmmoKind::Arrow,
            },
            AmmoDef {
                id: 884,
                name: "Iron arrow",
                ranged_strength: 10,
                kind: AmmoKind::Arrow,
            },
            AmmoDef {
                id: 886,
                name: "Steel arrow",
                ranged_strength: 16,
                kind: AmmoKind::Arrow,
            },
        ];

        let spells = [
            SpellDef {
                id: 1,
                name: "Wind Strike",
                level_req: 1,
                base_max_hit: 2,
                xp: 6,
                runes: vec![ItemStack::new(AIR_RUNE, 1), ItemStack::new(MIND_RUNE, 1)],
            },
            SpellDef {
                id: 2,
                name: "Fire Strike",
                level_req: 13,
                base_max_hit: 8,
                xp: 12,
                runes: vec![
                    ItemStack::new(AIR_RUNE, 2),
                    ItemStack::new(FIRE_RUNE, 3),
                    ItemStack::new(MIND_RUNE, 1),
                ],
            },
            SpellDef {
                id: 3,
                name: "Fire Bolt",
                level_req: 35,
                base_max_hit: 12,
                xp: 22,
                runes: vec![
                    ItemStack::new(AIR_RUNE, 3),
                    ItemStack::new(FIRE_RUNE, 4),
                    ItemStack::new(CHAOS_RUNE, 1),
                ],
            },
        ];

        let prayers = [
            prayer(1, "Thick Skin", PrayerBoost::Defence, 1.05, 1),
            prayer(2, "Burst of Strength", PrayerBoost::Strength, 1.05, 4),
            prayer(3, "Clarity of Thought", PrayerBoost::Attack, 1.05, 7),
            prayer(4, "Sharp Eye", PrayerBoost::Ranged, 1.05, 8),
            prayer(5, "Mystic Will", PrayerBoost::Magic, 1.05, 9),
            prayer(6, "Rock Skin", PrayerBoost::Defence, 1.10, 10),
            prayer(7, "Superhuman Strength", PrayerBoost::Strength, 1.10, 13),
            prayer(8, "Improved Reflexes", PrayerBoost::Attack, 1.10, 16),
            prayer(9, "Hawk Eye", PrayerBoost::Ranged, 1.10, 26),
            prayer(10, "Mystic Lore", PrayerBoost::Magic, 1.10, 27),
            prayer(11, "Steel Skin", PrayerBoost::Defence, 1.15, 28),
            prayer(12, "Ultimate Strength", PrayerBoost::Strength, 1.15, 31),
            prayer(13, "Incredible Reflexes", PrayerBoost::Attack, 1.15, 34),
            prayer(14, "Eagle Eye", PrayerBoost::Ranged, 1.15, 44),
            prayer(15, "Mystic Might", PrayerBoost::Magic, 1.15, 45),
            prayer(16, "Piety", PrayerBoost::Strength, 1.23, 70),
        ];

        Self {
            weapons: weapons.into_iter().map(|w| (w.id, w)).collect(),
            ammo: ammo.into_iter().map(|a| (a.id, a)).collect(),
            spells: spells.into_iter().map(|s| (s.id, s)).collect(),
            prayers: prayers.into_iter().map(|p| (p.id, p)).collect(),
        }
    }

    /// Look up a weapon definition.
    pub fn weapon(&self, id: u32) -> Option<&WeaponDef> {
        self.weapons.get(&id)
    }

    /// Look up an ammunition definition.
    pub fn ammo(&self, id: u32) -> Option<&AmmoDef> {
        self.ammo.get(&id)
    }

    /// Look up a spell definition.
    pub fn spell(&self, id: u32) -> Option<&SpellDef> {
        self.spells.get(&id)
    }

    /// Look up a prayer definition.
    pub fn prayer(&self, id: u32) -> Option<&PrayerDef> {
        self.prayers.get(&id)
    }
}

fn prayer(id: u32, name: &'static str, boost: PrayerBoost, multiplier: f64, level_req: u32) -> PrayerDef {
    PrayerDef {
        id,
        name,
        boost,
        multiplier,
        level_req,
    }
}

// =============================================================================
// TESTS
// =============================================================================
