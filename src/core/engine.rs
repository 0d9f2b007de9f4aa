use std::collections::BTreeMap;

use tracing::warn;

use super::types::{
    AgeCostProfile, DemandSegment, OperationKind, OperationRecord, PlanError, PlanInputs,
    PlanOutcome, VehicleType, YearSummary,
};

pub const SERVICE_LIFE_YEARS: i64 = 10;
pub const MAX_PROFILE_AGE: i64 = 10;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ShortfallRounding {
    // floor(remaining / range) + 1: over-buys by one whole vehicle whenever
    // the division is exact. Kept as the default for parity with plans
    // produced by the historical planner.
    #[default]
    FloorPlusOne,
    Ceiling,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PlannerPolicy {
    pub shortfall_rounding: ShortfallRounding,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FleetCohort {
    pub acquisition_year: i32,
    pub count: i64,
}

#[derive(Debug, Clone, Default)]
pub struct FleetInventory {
    cohorts: BTreeMap<String, FleetCohort>,
}

impl FleetInventory {
    pub fn new() -> Self {
        Self {
            cohorts: BTreeMap::new(),
        }
    }

    pub fn cohort(&self, vehicle_id: &str) -> Option<FleetCohort> {
        self.cohorts.get(vehicle_id).copied()
    }

    // Ascending vehicle id: the documented deterministic greedy tie-break.
    pub fn vehicle_ids(&self) -> Vec<String> {
        self.cohorts.keys().cloned().collect()
    }

    pub fn acquire(&mut self, vehicle_id: &str, year: i32, count: i64) {
        match self.cohorts.get_mut(vehicle_id) {
            // Merging into a live cohort keeps the original acquisition
            // year: age never resets.
            Some(cohort) => cohort.count += count,
            None => {
                self.cohorts.insert(
                    vehicle_id.to_string(),
                    FleetCohort {
                        acquisition_year: year,
                        count,
                    },
                );
            }
        }
    }

    pub fn draw(&mut self, vehicle_id: &str, count: i64) {
        let Some(cohort) = self.cohorts.get_mut(vehicle_id) else {
            panic!("draw on vehicle {vehicle_id} with no live cohort");
        };
        assert!(
            count <= cohort.count,
            "draw of {count} exceeds cohort of {} for vehicle {vehicle_id}",
            cohort.count
        );
        cohort.count -= count;
        if cohort.count == 0 {
            self.cohorts.remove(vehicle_id);
        }
    }

    pub fn remove(&mut self, vehicle_id: &str) -> Option<FleetCohort> {
        self.cohorts.remove(vehicle_id)
    }

    pub fn over_age(&self, year: i32) -> Vec<(String, FleetCohort)> {
        self.cohorts
            .iter()
            .filter(|(_, cohort)| vehicle_age(year, cohort.acquisition_year) > SERVICE_LIFE_YEARS)
            .map(|(id, cohort)| (id.clone(), *cohort))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cohorts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cohorts.is_empty()
    }
}

pub fn vehicle_age(current_year: i32, acquisition_year: i32) -> i64 {
    i64::from(current_year - acquisition_year) + 1
}

pub fn fleet_emissions(
    distance_km: f64,
    consumption_per_km: f64,
    emission_per_unit: f64,
    count: i64,
) -> f64 {
    distance_km * consumption_per_km * emission_per_unit * count as f64
}

#[allow(clippy::too_many_arguments)]
pub fn fleet_cost(
    acquisition_cost: f64,
    count: i64,
    distance_km: f64,
    fuel_cost_per_unit: f64,
    consumption_per_km: f64,
    insurance_cost: f64,
    maintenance_cost: f64,
    resale_value: f64,
) -> f64 {
    let count = count as f64;
    let fuel_cost = distance_km * fuel_cost_per_unit * consumption_per_km * count;
    acquisition_cost * count + fuel_cost + insurance_cost * count + maintenance_cost * count
        - resale_value * count
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AgeCostComponents {
    pub resale_value: f64,
    pub insurance_cost: f64,
    pub maintenance_cost: f64,
}

pub fn age_cost_components(
    age: i64,
    acquisition_cost: f64,
    profiles: &[AgeCostProfile],
) -> Result<AgeCostComponents, PlanError> {
    let clamped = age.min(MAX_PROFILE_AGE);
    let profile = profiles
        .iter()
        .find(|profile| profile.age == clamped)
        .ok_or(PlanError::MissingCostProfile { age: clamped })?;
    Ok(AgeCostComponents {
        resale_value: profile.resale_pct / 100.0 * acquisition_cost,
        insurance_cost: profile.insurance_pct / 100.0 * acquisition_cost,
        maintenance_cost: profile.maintenance_pct / 100.0 * acquisition_cost,
    })
}

pub fn shortfall_count(remaining_km: f64, yearly_range_km: f64, rounding: ShortfallRounding) -> i64 {
    match rounding {
        ShortfallRounding::FloorPlusOne => (remaining_km / yearly_range_km).floor() as i64 + 1,
        ShortfallRounding::Ceiling => (remaining_km / yearly_range_km).ceil() as i64,
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FuelTerms {
    fuel: String,
    consumption_per_km: f64,
    cost_per_unit: f64,
    emission_per_unit: f64,
}

// The first assignment row wins when a vehicle lists several fuels. A vehicle
// with no assignment at all is unusable, not an error.
fn fuel_terms(
    vehicle_id: &str,
    year: i32,
    inputs: &PlanInputs,
) -> Result<Option<FuelTerms>, PlanError> {
    let Some(assignment) = inputs
        .fuel_assignments
        .iter()
        .find(|assignment| assignment.vehicle_id == vehicle_id)
    else {
        return Ok(None);
    };
    let market = inputs
        .fuel_market
        .iter()
        .find(|entry| entry.fuel == assignment.fuel && entry.year == year)
        .ok_or_else(|| PlanError::MissingFuelMarket {
            fuel: assignment.fuel.clone(),
            year,
        })?;
    Ok(Some(FuelTerms {
        fuel: assignment.fuel.clone(),
        consumption_per_km: assignment.consumption_per_km,
        cost_per_unit: market.cost_per_unit,
        emission_per_unit: market.emission_per_unit,
    }))
}

pub(crate) fn carbon_budget_for(year: i32, inputs: &PlanInputs) -> Result<f64, PlanError> {
    inputs
        .carbon_budgets
        .iter()
        .find(|entry| entry.year == year)
        .map(|entry| entry.max_emissions)
        .ok_or(PlanError::MissingCarbonBudget { year })
}

#[derive(Copy, Clone, Debug)]
struct YearLedger {
    budget: f64,
    emissions: f64,
    cost: f64,
}

pub fn run_plan(inputs: &PlanInputs, policy: PlannerPolicy) -> Result<PlanOutcome, PlanError> {
    let catalog: BTreeMap<&str, &VehicleType> = inputs
        .vehicles
        .iter()
        .map(|vehicle| (vehicle.id.as_str(), vehicle))
        .collect();

    // Stable sort: years ascend, in-year segments keep table order.
    let mut segments: Vec<&DemandSegment> = inputs.demand.iter().collect();
    segments.sort_by_key(|segment| segment.year);

    let mut fleet = FleetInventory::new();
    let mut records = Vec::new();
    let mut years = Vec::new();

    let mut index = 0;
    while index < segments.len() {
        let year = segments[index].year;
        let mut ledger = YearLedger {
            budget: carbon_budget_for(year, inputs)?,
            emissions: 0.0,
            cost: 0.0,
        };
        while index < segments.len() && segments[index].year == year {
            serve_segment(
                inputs,
                &catalog,
                segments[index],
                policy,
                &mut fleet,
                &mut ledger,
                &mut records,
            )?;
            index += 1;
        }
        retire_over_age(inputs, &catalog, year, &mut fleet, &mut records)?;
        years.push(YearSummary {
            year,
            cost: ledger.cost,
            emissions: ledger.emissions,
            carbon_budget: ledger.budget,
        });
    }

    let total_cost = years.iter().map(|summary| summary.cost).sum();
    let total_emissions = years.iter().map(|summary| summary.emissions).sum();
    Ok(PlanOutcome {
        records,
        years,
        total_cost,
        total_emissions,
    })
}

fn serve_segment(
    inputs: &PlanInputs,
    catalog: &BTreeMap<&str, &VehicleType>,
    segment: &DemandSegment,
    policy: PlannerPolicy,
    fleet: &mut FleetInventory,
    ledger: &mut YearLedger,
    records: &mut Vec<OperationRecord>,
) -> Result<(), PlanError> {
    let mut remaining_km = segment.demand_km;

    // Phase 1: drain matching inventory before any purchase.
    for vehicle_id in fleet.vehicle_ids() {
        if remaining_km <= 0.0 {
            break;
        }
        let Some(cohort) = fleet.cohort(&vehicle_id) else {
            continue;
        };
        let vehicle = *catalog
            .get(vehicle_id.as_str())
            .ok_or_else(|| PlanError::UnknownVehicle {
                vehicle_id: vehicle_id.clone(),
            })?;
        if vehicle.size != segment.size || vehicle.distance_capability < segment.distance_bucket {
            continue;
        }
        let age = vehicle_age(segment.year, cohort.acquisition_year);
        if age > SERVICE_LIFE_YEARS {
            continue;
        }
        let Some(terms) = fuel_terms(&vehicle_id, segment.year, inputs)? else {
            continue;
        };
        let components = age_cost_components(age, vehicle.acquisition_cost, &inputs.cost_profiles)?;

        let covered_km = (cohort.count as f64 * vehicle.yearly_range_km).min(remaining_km);
        let used = (covered_km / vehicle.yearly_range_km).floor() as i64;

        ledger.emissions += fleet_emissions(
            covered_km,
            terms.consumption_per_km,
            terms.emission_per_unit,
            used,
        );
        ledger.cost += fleet_cost(
            vehicle.acquisition_cost,
            used,
            covered_km,
            terms.cost_per_unit,
            terms.consumption_per_km,
            components.insurance_cost,
            components.maintenance_cost,
            components.resale_value,
        );
        records.push(OperationRecord {
            year: segment.year,
            vehicle_id: vehicle_id.clone(),
            num_vehicles: used,
            kind: OperationKind::Use,
            fuel: terms.fuel,
            distance_bucket: segment.distance_bucket,
            distance_per_vehicle_km: vehicle.yearly_range_km,
        });
        fleet.draw(&vehicle_id, used);
        remaining_km -= covered_km;
    }

    if remaining_km <= 0.0 {
        return Ok(());
    }

    // Phase 2: buy the shortfall from this model year's catalog.
    for (vehicle_id, vehicle) in catalog {
        if vehicle.model_year != segment.year
            || vehicle.size != segment.size
            || vehicle.distance_capability < segment.distance_bucket
        {
            continue;
        }
        let Some(terms) = fuel_terms(vehicle_id, segment.year, inputs)? else {
            continue;
        };
        let components = age_cost_components(1, vehicle.acquisition_cost, &inputs.cost_profiles)?;

        let needed = shortfall_count(remaining_km, vehicle.yearly_range_km, policy.shortfall_rounding);
        let added_emissions = fleet_emissions(
            vehicle.yearly_range_km,
            terms.consumption_per_km,
            terms.emission_per_unit,
            needed,
        );
        if ledger.emissions + added_emissions > ledger.budget {
            warn!(
                year = segment.year,
                vehicle_id = %vehicle_id,
                count = needed,
                "purchase rejected: would exceed the year's carbon budget"
            );
            continue;
        }

        ledger.emissions += added_emissions;
        ledger.cost += fleet_cost(
            vehicle.acquisition_cost,
            needed,
            vehicle.yearly_range_km,
            terms.cost_per_unit,
            terms.consumption_per_km,
            components.insurance_cost,
            components.maintenance_cost,
            components.resale_value,
        );
        records.push(OperationRecord {
            year: segment.year,
            vehicle_id: (*vehicle_id).to_string(),
            num_vehicles: needed,
            kind: OperationKind::Buy,
            fuel: terms.fuel,
            distance_bucket: segment.distance_bucket,
            distance_per_vehicle_km: vehicle.yearly_range_km,
        });
        fleet.acquire(vehicle_id, segment.year, needed);
        remaining_km -= needed as f64 * vehicle.yearly_range_km;
        if remaining_km <= 0.0 {
            break;
        }
    }

    if remaining_km > 0.0 {
        warn!(
            year = segment.year,
            size = ?segment.size,
            bucket = ?segment.distance_bucket,
            unmet_km = remaining_km,
            "segment demand left unmet"
        );
    }
    Ok(())
}

// Phase 3: unconditional full-cohort retirement once age exceeds the service
// life. The 20% turnover cap is checked only by the verifier.
fn retire_over_age(
    inputs: &PlanInputs,
    catalog: &BTreeMap<&str, &VehicleType>,
    year: i32,
    fleet: &mut FleetInventory,
    records: &mut Vec<OperationRecord>,
) -> Result<(), PlanError> {
    for (vehicle_id, cohort) in fleet.over_age(year) {
        let vehicle = *catalog
            .get(vehicle_id.as_str())
            .ok_or_else(|| PlanError::UnknownVehicle {
                vehicle_id: vehicle_id.clone(),
            })?;
        let assignment = inputs
            .fuel_assignments
            .iter()
            .find(|assignment| assignment.vehicle_id == vehicle_id)
            .ok_or_else(|| PlanError::MissingFuelAssignment {
                vehicle_id: vehicle_id.clone(),
            })?;
        records.push(OperationRecord {
            year,
            vehicle_id: vehicle_id.clone(),
            num_vehicles: cohort.count,
            kind: OperationKind::Sell,
            fuel: assignment.fuel.clone(),
            distance_bucket: vehicle.distance_capability,
            distance_per_vehicle_km: vehicle.yearly_range_km,
        });
        fleet.remove(&vehicle_id);
    }
    Ok(())
}
