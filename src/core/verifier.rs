use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::engine::carbon_budget_for;
use super::types::{
    DistanceBucket, OperationKind, OperationRecord, PlanError, PlanInputs, SizeClass,
};

pub const MAX_TURNOVER_SHARE: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmissionViolation {
    pub year: i32,
    pub emissions: f64,
    pub limit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DemandViolation {
    pub year: i32,
    pub size: SizeClass,
    pub distance_bucket: DistanceBucket,
    pub covered_km: f64,
    pub demand_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnoverViolation {
    pub year: i32,
    pub sold: i64,
    pub allowed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NegativeCountViolation {
    pub year: i32,
    pub vehicle_id: String,
    pub num_vehicles: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VerificationReport {
    pub emission: Vec<EmissionViolation>,
    pub demand: Vec<DemandViolation>,
    pub turnover: Vec<TurnoverViolation>,
    pub negative_counts: Vec<NegativeCountViolation>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.emission.is_empty()
            && self.demand.is_empty()
            && self.turnover.is_empty()
            && self.negative_counts.is_empty()
    }

    pub fn violation_count(&self) -> usize {
        self.emission.len() + self.demand.len() + self.turnover.len() + self.negative_counts.len()
    }
}

// Re-derives every total from the record stream and the reference tables.
// Never mutates, never re-plans; infeasibility is reported, not repaired.
pub fn verify_plan(
    inputs: &PlanInputs,
    records: &[OperationRecord],
) -> Result<VerificationReport, PlanError> {
    let mut report = VerificationReport::default();
    check_emissions(inputs, records, &mut report)?;
    check_demand(inputs, records, &mut report)?;
    check_turnover(records, &mut report);
    check_negative_counts(records, &mut report);
    Ok(report)
}

// Buy and Use records represent driven distance; Sell is disposal and
// contributes neither emissions nor coverage.
fn drives(record: &OperationRecord) -> bool {
    matches!(record.kind, OperationKind::Buy | OperationKind::Use)
}

fn consumption_for(inputs: &PlanInputs, vehicle_id: &str, fuel: &str) -> Result<f64, PlanError> {
    inputs
        .fuel_assignments
        .iter()
        .find(|assignment| assignment.vehicle_id == vehicle_id && assignment.fuel == fuel)
        .map(|assignment| assignment.consumption_per_km)
        .ok_or_else(|| PlanError::MissingFuelAssignment {
            vehicle_id: vehicle_id.to_string(),
        })
}

fn emission_rate_for(inputs: &PlanInputs, fuel: &str, year: i32) -> Result<f64, PlanError> {
    inputs
        .fuel_market
        .iter()
        .find(|entry| entry.fuel == fuel && entry.year == year)
        .map(|entry| entry.emission_per_unit)
        .ok_or_else(|| PlanError::MissingFuelMarket {
            fuel: fuel.to_string(),
            year,
        })
}

fn check_emissions(
    inputs: &PlanInputs,
    records: &[OperationRecord],
    report: &mut VerificationReport,
) -> Result<(), PlanError> {
    let years: BTreeSet<i32> = records.iter().map(|record| record.year).collect();
    for year in years {
        let mut emissions = 0.0;
        for record in records.iter().filter(|r| r.year == year && drives(r)) {
            let consumption = consumption_for(inputs, &record.vehicle_id, &record.fuel)?;
            let rate = emission_rate_for(inputs, &record.fuel, year)?;
            emissions +=
                record.distance_per_vehicle_km * consumption * rate * record.num_vehicles as f64;
        }
        let limit = carbon_budget_for(year, inputs)?;
        if emissions > limit {
            report.emission.push(EmissionViolation {
                year,
                emissions,
                limit,
            });
        }
    }
    Ok(())
}

fn check_demand(
    inputs: &PlanInputs,
    records: &[OperationRecord],
    report: &mut VerificationReport,
) -> Result<(), PlanError> {
    // Records carry no size class; join through the catalog.
    let sizes: BTreeMap<&str, SizeClass> = inputs
        .vehicles
        .iter()
        .map(|vehicle| (vehicle.id.as_str(), vehicle.size))
        .collect();

    for segment in &inputs.demand {
        let mut covered_km = 0.0;
        for record in records.iter().filter(|r| {
            r.year == segment.year && r.distance_bucket == segment.distance_bucket && drives(r)
        }) {
            let size = sizes.get(record.vehicle_id.as_str()).copied().ok_or_else(|| {
                PlanError::UnknownVehicle {
                    vehicle_id: record.vehicle_id.clone(),
                }
            })?;
            if size != segment.size {
                continue;
            }
            covered_km += record.distance_per_vehicle_km * record.num_vehicles as f64;
        }
        if covered_km < segment.demand_km {
            report.demand.push(DemandViolation {
                year: segment.year,
                size: segment.size,
                distance_bucket: segment.distance_bucket,
                covered_km,
                demand_km: segment.demand_km,
            });
        }
    }
    Ok(())
}

fn check_turnover(records: &[OperationRecord], report: &mut VerificationReport) {
    let years: BTreeSet<i32> = records.iter().map(|record| record.year).collect();
    for year in years {
        let mut sold = 0;
        let mut bought = 0;
        for record in records.iter().filter(|r| r.year == year) {
            match record.kind {
                OperationKind::Sell => sold += record.num_vehicles,
                OperationKind::Buy => bought += record.num_vehicles,
                OperationKind::Use => {}
            }
        }
        let allowed = (MAX_TURNOVER_SHARE * bought as f64) as i64;
        if sold > allowed {
            report.turnover.push(TurnoverViolation {
                year,
                sold,
                allowed,
            });
        }
    }
}

fn check_negative_counts(records: &[OperationRecord], report: &mut VerificationReport) {
    for record in records {
        if record.num_vehicles < 0 {
            report.negative_counts.push(NegativeCountViolation {
                year: record.year,
                vehicle_id: record.vehicle_id.clone(),
                num_vehicles: record.num_vehicles,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::{PlannerPolicy, run_plan};
    use crate::core::types::{
        AgeCostProfile, CarbonBudgetEntry, DemandSegment, FuelAssignment, FuelMarketEntry,
        VehicleType,
    };

    fn vehicle(id: &str, size: SizeClass, capability: DistanceBucket) -> VehicleType {
        VehicleType {
            id: id.to_string(),
            size,
            distance_capability: capability,
            model_year: 2023,
            yearly_range_km: 10_000.0,
            acquisition_cost: 50_000.0,
        }
    }

    fn record(
        year: i32,
        vehicle_id: &str,
        num_vehicles: i64,
        kind: OperationKind,
        bucket: DistanceBucket,
    ) -> OperationRecord {
        OperationRecord {
            year,
            vehicle_id: vehicle_id.to_string(),
            num_vehicles,
            kind,
            fuel: "Diesel".to_string(),
            distance_bucket: bucket,
            distance_per_vehicle_km: 10_000.0,
        }
    }

    fn base_inputs() -> PlanInputs {
        PlanInputs {
            vehicles: vec![vehicle("DSL_S1_2023", SizeClass::S1, DistanceBucket::D1)],
            fuel_assignments: vec![FuelAssignment {
                vehicle_id: "DSL_S1_2023".to_string(),
                fuel: "Diesel".to_string(),
                consumption_per_km: 0.1,
            }],
            fuel_market: (2023..=2040)
                .map(|year| FuelMarketEntry {
                    fuel: "Diesel".to_string(),
                    year,
                    cost_per_unit: 2.0,
                    emission_per_unit: 1.0,
                })
                .collect(),
            demand: vec![DemandSegment {
                year: 2023,
                size: SizeClass::S1,
                distance_bucket: DistanceBucket::D1,
                demand_km: 25_000.0,
            }],
            cost_profiles: (1..=10)
                .map(|age| AgeCostProfile {
                    age,
                    resale_pct: 40.0,
                    insurance_pct: 5.0,
                    maintenance_pct: 10.0,
                })
                .collect(),
            carbon_budgets: (2023..=2040)
                .map(|year| CarbonBudgetEntry {
                    year,
                    max_emissions: 1e12,
                })
                .collect(),
        }
    }

    #[test]
    fn engine_plan_within_budget_verifies_clean() {
        let inputs = base_inputs();
        let outcome = run_plan(&inputs, PlannerPolicy::default()).expect("plan succeeds");
        let report = verify_plan(&inputs, &outcome.records).expect("verify succeeds");
        assert!(report.is_clean(), "unexpected violations: {report:?}");
    }

    #[test]
    fn emission_overrun_is_reported_not_raised() {
        let mut inputs = base_inputs();
        // 3 vehicles drive 10 000 km at 0.1 unit/km and 1.0 CO2/unit = 3 000
        inputs.carbon_budgets = vec![CarbonBudgetEntry {
            year: 2023,
            max_emissions: 2_999.0,
        }];
        let records = vec![record(
            2023,
            "DSL_S1_2023",
            3,
            OperationKind::Buy,
            DistanceBucket::D1,
        )];

        let report = verify_plan(&inputs, &records).expect("verify succeeds");
        assert_eq!(report.emission.len(), 1);
        assert_eq!(report.emission[0].year, 2023);
        assert!((report.emission[0].emissions - 3_000.0).abs() <= 1e-6);
        assert!((report.emission[0].limit - 2_999.0).abs() <= 1e-6);
    }

    #[test]
    fn demand_shortfall_is_reported_per_segment() {
        let inputs = base_inputs();
        // 2 vehicles cover 20 000 of the 25 000 km requirement.
        let records = vec![record(
            2023,
            "DSL_S1_2023",
            2,
            OperationKind::Use,
            DistanceBucket::D1,
        )];

        let report = verify_plan(&inputs, &records).expect("verify succeeds");
        assert_eq!(report.demand.len(), 1);
        let violation = &report.demand[0];
        assert_eq!(violation.size, SizeClass::S1);
        assert_eq!(violation.distance_bucket, DistanceBucket::D1);
        assert!((violation.covered_km - 20_000.0).abs() <= 1e-6);
    }

    #[test]
    fn sell_records_do_not_count_toward_coverage_or_emissions() {
        let mut inputs = base_inputs();
        inputs.demand[0].demand_km = 0.0;
        inputs.carbon_budgets[0].max_emissions = 0.0;
        let records = vec![record(
            2023,
            "DSL_S1_2023",
            5,
            OperationKind::Sell,
            DistanceBucket::D1,
        )];

        let report = verify_plan(&inputs, &records).expect("verify succeeds");
        assert!(report.emission.is_empty());
        assert!(report.demand.is_empty());
        // 5 sold against 0 bought still trips the turnover cap.
        assert_eq!(report.turnover.len(), 1);
    }

    #[test]
    fn turnover_cap_allows_twenty_percent_of_buys() {
        let inputs = base_inputs();
        let records = vec![
            record(2023, "DSL_S1_2023", 10, OperationKind::Buy, DistanceBucket::D1),
            record(2023, "DSL_S1_2023", 2, OperationKind::Sell, DistanceBucket::D1),
        ];
        let report = verify_plan(&inputs, &records).expect("verify succeeds");
        assert!(report.turnover.is_empty());

        let records = vec![
            record(2023, "DSL_S1_2023", 10, OperationKind::Buy, DistanceBucket::D1),
            record(2023, "DSL_S1_2023", 3, OperationKind::Sell, DistanceBucket::D1),
        ];
        let report = verify_plan(&inputs, &records).expect("verify succeeds");
        assert_eq!(report.turnover.len(), 1);
        assert_eq!(report.turnover[0].sold, 3);
        assert_eq!(report.turnover[0].allowed, 2);
    }

    #[test]
    fn engine_forced_retirement_trips_verifier_turnover_cap() {
        // The engine retires unconditionally; the verifier enforces the 20%
        // cap the engine never checks. The mismatch is deliberate.
        let mut inputs = base_inputs();
        inputs.demand.push(DemandSegment {
            year: 2033,
            size: SizeClass::S1,
            distance_bucket: DistanceBucket::D1,
            demand_km: 0.0,
        });

        let outcome = run_plan(&inputs, PlannerPolicy::default()).expect("plan succeeds");
        let report = verify_plan(&inputs, &outcome.records).expect("verify succeeds");
        assert_eq!(report.turnover.len(), 1);
        assert_eq!(report.turnover[0].year, 2033);
    }

    #[test]
    fn negative_counts_are_flagged() {
        let inputs = base_inputs();
        let mut records = vec![record(
            2023,
            "DSL_S1_2023",
            3,
            OperationKind::Buy,
            DistanceBucket::D1,
        )];
        records.push(record(
            2023,
            "DSL_S1_2023",
            -1,
            OperationKind::Use,
            DistanceBucket::D1,
        ));

        let report = verify_plan(&inputs, &records).expect("verify succeeds");
        assert_eq!(report.negative_counts.len(), 1);
        assert_eq!(report.negative_counts[0].num_vehicles, -1);
        assert!(!report.is_clean());
        assert_eq!(report.violation_count(), 1);
    }

    #[test]
    fn unknown_vehicle_in_plan_is_fatal() {
        let inputs = base_inputs();
        let records = vec![record(
            2023,
            "GHOST",
            1,
            OperationKind::Use,
            DistanceBucket::D1,
        )];

        let err = verify_plan(&inputs, &records).expect_err("must abort");
        assert_eq!(
            err,
            PlanError::MissingFuelAssignment {
                vehicle_id: "GHOST".to_string()
            }
        );
    }
}
