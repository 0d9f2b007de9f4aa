use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum SizeClass {
    S1,
    S2,
    S3,
    S4,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum DistanceBucket {
    D1,
    D2,
    D3,
    D4,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum OperationKind {
    Buy,
    Use,
    Sell,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleType {
    pub id: String,
    pub size: SizeClass,
    pub distance_capability: DistanceBucket,
    pub model_year: i32,
    pub yearly_range_km: f64,
    pub acquisition_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelAssignment {
    pub vehicle_id: String,
    pub fuel: String,
    pub consumption_per_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelMarketEntry {
    pub fuel: String,
    pub year: i32,
    pub cost_per_unit: f64,
    pub emission_per_unit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandSegment {
    pub year: i32,
    pub size: SizeClass,
    pub distance_bucket: DistanceBucket,
    pub demand_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeCostProfile {
    pub age: i64,
    pub resale_pct: f64,
    pub insurance_pct: f64,
    pub maintenance_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarbonBudgetEntry {
    pub year: i32,
    pub max_emissions: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanInputs {
    pub vehicles: Vec<VehicleType>,
    pub fuel_assignments: Vec<FuelAssignment>,
    pub fuel_market: Vec<FuelMarketEntry>,
    pub demand: Vec<DemandSegment>,
    pub cost_profiles: Vec<AgeCostProfile>,
    pub carbon_budgets: Vec<CarbonBudgetEntry>,
}

// num_vehicles is signed so the verifier can represent and flag negative
// counts in externally produced plans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub year: i32,
    pub vehicle_id: String,
    pub num_vehicles: i64,
    pub kind: OperationKind,
    pub fuel: String,
    pub distance_bucket: DistanceBucket,
    pub distance_per_vehicle_km: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct YearSummary {
    pub year: i32,
    pub cost: f64,
    pub emissions: f64,
    pub carbon_budget: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanOutcome {
    pub records: Vec<OperationRecord>,
    pub years: Vec<YearSummary>,
    pub total_cost: f64,
    pub total_emissions: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("no fuel market entry for fuel {fuel} in year {year}")]
    MissingFuelMarket { fuel: String, year: i32 },
    #[error("no cost profile row for vehicle age {age}")]
    MissingCostProfile { age: i64 },
    #[error("no carbon budget entry for year {year}")]
    MissingCarbonBudget { year: i32 },
    #[error("no fuel assignment for vehicle {vehicle_id}")]
    MissingFuelAssignment { vehicle_id: String },
    #[error("vehicle {vehicle_id} is not in the catalog")]
    UnknownVehicle { vehicle_id: String },
}
