mod engine;
mod types;
mod verifier;

pub use engine::{
    AgeCostComponents, FleetCohort, FleetInventory, MAX_PROFILE_AGE, PlannerPolicy,
    SERVICE_LIFE_YEARS, ShortfallRounding, age_cost_components, fleet_cost, fleet_emissions,
    run_plan, shortfall_count, vehicle_age,
};
pub use types::{
    AgeCostProfile, CarbonBudgetEntry, DemandSegment, DistanceBucket, FuelAssignment,
    FuelMarketEntry, OperationKind, OperationRecord, PlanError, PlanInputs, PlanOutcome,
    SizeClass, VehicleType, YearSummary,
};
pub use verifier::{
    DemandViolation, EmissionViolation, MAX_TURNOVER_SHARE, NegativeCountViolation,
    TurnoverViolation, VerificationReport, verify_plan,
};
