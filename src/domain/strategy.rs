//! Slot assignment strategies
//!
//! A strategy only chooses; it never occupies. The lot occupies the chosen
//! slot and re-asks the strategy if another gate got there first.

use crate::domain::floor::Floor;
use crate::domain::slot::Slot;
use crate::domain::types::VehicleType;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;
use std::sync::Arc;

pub trait SlotAssignmentStrategy: Send + Sync {
    /// Pick a free slot on `floor` compatible with `vehicle_type`
    fn select_slot<'a>(&self, floor: &'a Floor, vehicle_type: VehicleType) -> Option<&'a Slot>;

    fn name(&self) -> &'static str;
}

/// First eligible slot in entrance order (lowest slot number)
#[derive(Debug, Default, Clone, Copy)]
pub struct NearestStrategy;

impl SlotAssignmentStrategy for NearestStrategy {
    fn select_slot<'a>(&self, floor: &'a Floor, vehicle_type: VehicleType) -> Option<&'a Slot> {
        floor.slots().iter().find(|slot| slot.is_eligible(vehicle_type))
    }

    fn name(&self) -> &'static str {
        "nearest"
    }
}

/// Last eligible slot in entrance order, leaving near slots for quick turnover
#[derive(Debug, Default, Clone, Copy)]
pub struct OptimizedStrategy;

impl SlotAssignmentStrategy for OptimizedStrategy {
    fn select_slot<'a>(&self, floor: &'a Floor, vehicle_type: VehicleType) -> Option<&'a Slot> {
        floor.slots().iter().rev().find(|slot| slot.is_eligible(vehicle_type))
    }

    fn name(&self) -> &'static str {
        "optimized"
    }
}

/// Uniform pick among all eligible slots
#[derive(Debug)]
pub struct RandomStrategy {
    rng: Mutex<StdRng>,
}

impl RandomStrategy {
    pub fn new() -> Self {
        Self { rng: Mutex::new(StdRng::from_entropy()) }
    }

    /// Reproducible picks for tests and simulations
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Mutex::new(StdRng::seed_from_u64(seed)) }
    }
}

impl Default for RandomStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl SlotAssignmentStrategy for RandomStrategy {
    fn select_slot<'a>(&self, floor: &'a Floor, vehicle_type: VehicleType) -> Option<&'a Slot> {
        let eligible: Vec<&Slot> = floor.slots().iter().filter(|slot| slot.is_eligible(vehicle_type)).collect();
        eligible.choose(&mut *self.rng.lock()).copied()
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Strategy names as they appear in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Nearest,
    Optimized,
    Random,
}

impl StrategyKind {
    pub fn build(self) -> Arc<dyn SlotAssignmentStrategy> {
        match self {
            StrategyKind::Nearest => Arc::new(NearestStrategy),
            StrategyKind::Optimized => Arc::new(OptimizedStrategy),
            StrategyKind::Random => Arc::new(RandomStrategy::new()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Nearest => "nearest",
            StrategyKind::Optimized => "optimized",
            StrategyKind::Random => "random",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{FloorNumber, SlotNumber, Vehicle};

    fn standard_floor() -> Floor {
        let mut floor = Floor::new(FloorNumber(1));
        floor.add_slot_range(1..=2, VehicleType::Motorcycle).unwrap();
        floor.add_slot_range(3..=6, VehicleType::Car).unwrap();
        floor.add_slot_range(7..=8, VehicleType::Truck).unwrap();
        floor
    }

    fn fill(floor: &Floor, number: u32, vehicle_type: VehicleType) {
        let vehicle = Vehicle::new(format!("V{number}"), vehicle_type);
        floor.slot(SlotNumber(number)).unwrap().occupy(&vehicle).unwrap();
    }

    #[test]
    fn test_nearest_picks_lowest_eligible() {
        let floor = standard_floor();
        assert_eq!(NearestStrategy.select_slot(&floor, VehicleType::Car).unwrap().number(), SlotNumber(3));

        fill(&floor, 3, VehicleType::Car);
        assert_eq!(NearestStrategy.select_slot(&floor, VehicleType::Car).unwrap().number(), SlotNumber(4));
        assert_eq!(NearestStrategy.select_slot(&floor, VehicleType::Motorcycle).unwrap().number(), SlotNumber(1));
    }

    #[test]
    fn test_optimized_picks_highest_eligible() {
        let floor = standard_floor();
        assert_eq!(OptimizedStrategy.select_slot(&floor, VehicleType::Car).unwrap().number(), SlotNumber(6));

        fill(&floor, 6, VehicleType::Car);
        assert_eq!(OptimizedStrategy.select_slot(&floor, VehicleType::Car).unwrap().number(), SlotNumber(5));
        assert_eq!(OptimizedStrategy.select_slot(&floor, VehicleType::Truck).unwrap().number(), SlotNumber(8));
    }

    #[test]
    fn test_none_when_type_full() {
        let floor = standard_floor();
        fill(&floor, 7, VehicleType::Truck);
        fill(&floor, 8, VehicleType::Truck);

        assert!(NearestStrategy.select_slot(&floor, VehicleType::Truck).is_none());
        assert!(OptimizedStrategy.select_slot(&floor, VehicleType::Truck).is_none());
        assert!(RandomStrategy::with_seed(7).select_slot(&floor, VehicleType::Truck).is_none());
    }

    #[test]
    fn test_random_only_picks_eligible() {
        let floor = standard_floor();
        fill(&floor, 4, VehicleType::Car);
        let strategy = RandomStrategy::with_seed(42);

        for _ in 0..50 {
            let slot = strategy.select_slot(&floor, VehicleType::Car).unwrap();
            assert_eq!(slot.compatible_type(), VehicleType::Car);
            assert_ne!(slot.number(), SlotNumber(4));
        }
    }

    #[test]
    fn test_strategy_kind_builds_named_strategy() {
        for kind in [StrategyKind::Nearest, StrategyKind::Optimized, StrategyKind::Random] {
            assert_eq!(kind.build().name(), kind.as_str());
        }
    }

    #[test]
    fn test_strategy_kind_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            strategy: StrategyKind,
        }
        let parsed: Wrapper = toml::from_str(r#"strategy = "optimized""#).unwrap();
        assert_eq!(parsed.strategy, StrategyKind::Optimized);
        assert!(toml::from_str::<Wrapper>(r#"strategy = "closest""#).is_err());
    }
}
