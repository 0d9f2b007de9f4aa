use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::{
    AgeCostProfile, CarbonBudgetEntry, DemandSegment, DistanceBucket, FuelAssignment,
    FuelMarketEntry, OperationKind, OperationRecord, PlanInputs, SizeClass, VehicleType,
};

pub const VEHICLES_FILE: &str = "vehicles.csv";
pub const VEHICLE_FUELS_FILE: &str = "vehicles_fuels.csv";
pub const FUELS_FILE: &str = "fuels.csv";
pub const DEMAND_FILE: &str = "demand.csv";
pub const COST_PROFILES_FILE: &str = "cost_profiles.csv";
pub const CARBON_BUDGETS_FILE: &str = "carbon_emissions.csv";

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Csv { path: String, source: csv::Error },
    #[error("failed to write {path}: {source}")]
    Io { path: String, source: io::Error },
}

// Row structs carry the exact upstream column headers; unknown columns in the
// files (vehicle display names, cost uncertainty) are ignored.

#[derive(Debug, Deserialize)]
struct VehicleRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Size")]
    size: SizeClass,
    #[serde(rename = "Distance")]
    distance: DistanceBucket,
    #[serde(rename = "Year")]
    year: i32,
    #[serde(rename = "Yearly range (km)")]
    yearly_range_km: f64,
    #[serde(rename = "Cost ($)")]
    cost: f64,
}

impl From<VehicleRow> for VehicleType {
    fn from(row: VehicleRow) -> Self {
        VehicleType {
            id: row.id,
            size: row.size,
            distance_capability: row.distance,
            model_year: row.year,
            yearly_range_km: row.yearly_range_km,
            acquisition_cost: row.cost,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VehicleFuelRow {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Fuel")]
    fuel: String,
    #[serde(rename = "Consumption (unit_fuel/km)")]
    consumption_per_km: f64,
}

impl From<VehicleFuelRow> for FuelAssignment {
    fn from(row: VehicleFuelRow) -> Self {
        FuelAssignment {
            vehicle_id: row.id,
            fuel: row.fuel,
            consumption_per_km: row.consumption_per_km,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FuelRow {
    #[serde(rename = "Fuel")]
    fuel: String,
    #[serde(rename = "Year")]
    year: i32,
    #[serde(rename = "Cost ($/unit_fuel)")]
    cost_per_unit: f64,
    #[serde(rename = "Emissions (CO2/unit_fuel)")]
    emission_per_unit: f64,
}

impl From<FuelRow> for FuelMarketEntry {
    fn from(row: FuelRow) -> Self {
        FuelMarketEntry {
            fuel: row.fuel,
            year: row.year,
            cost_per_unit: row.cost_per_unit,
            emission_per_unit: row.emission_per_unit,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DemandRow {
    #[serde(rename = "Year")]
    year: i32,
    #[serde(rename = "Size")]
    size: SizeClass,
    #[serde(rename = "Distance")]
    distance: DistanceBucket,
    #[serde(rename = "Demand (km)")]
    demand_km: f64,
}

impl From<DemandRow> for DemandSegment {
    fn from(row: DemandRow) -> Self {
        DemandSegment {
            year: row.year,
            size: row.size,
            distance_bucket: row.distance,
            demand_km: row.demand_km,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CostProfileRow {
    #[serde(rename = "End of Year")]
    age: i64,
    #[serde(rename = "Resale Value %")]
    resale_pct: f64,
    #[serde(rename = "Insurance Cost %")]
    insurance_pct: f64,
    #[serde(rename = "Maintenance Cost %")]
    maintenance_pct: f64,
}

impl From<CostProfileRow> for AgeCostProfile {
    fn from(row: CostProfileRow) -> Self {
        AgeCostProfile {
            age: row.age,
            resale_pct: row.resale_pct,
            insurance_pct: row.insurance_pct,
            maintenance_pct: row.maintenance_pct,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CarbonBudgetRow {
    #[serde(rename = "Year")]
    year: i32,
    #[serde(rename = "Carbon emission CO2/kg")]
    max_emissions: f64,
}

impl From<CarbonBudgetRow> for CarbonBudgetEntry {
    fn from(row: CarbonBudgetRow) -> Self {
        CarbonBudgetEntry {
            year: row.year,
            max_emissions: row.max_emissions,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PlanRow {
    #[serde(rename = "Year")]
    year: i32,
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Num_Vehicles")]
    num_vehicles: i64,
    #[serde(rename = "Type")]
    kind: OperationKind,
    #[serde(rename = "Fuel")]
    fuel: String,
    #[serde(rename = "Distance_bucket")]
    distance_bucket: DistanceBucket,
    #[serde(rename = "Distance_per_vehicle(km)")]
    distance_per_vehicle_km: f64,
}

impl From<PlanRow> for OperationRecord {
    fn from(row: PlanRow) -> Self {
        OperationRecord {
            year: row.year,
            vehicle_id: row.id,
            num_vehicles: row.num_vehicles,
            kind: row.kind,
            fuel: row.fuel,
            distance_bucket: row.distance_bucket,
            distance_per_vehicle_km: row.distance_per_vehicle_km,
        }
    }
}

impl From<&OperationRecord> for PlanRow {
    fn from(record: &OperationRecord) -> Self {
        PlanRow {
            year: record.year,
            id: record.vehicle_id.clone(),
            num_vehicles: record.num_vehicles,
            kind: record.kind,
            fuel: record.fuel.clone(),
            distance_bucket: record.distance_bucket,
            distance_per_vehicle_km: record.distance_per_vehicle_km,
        }
    }
}

const PLAN_HEADERS: [&str; 7] = [
    "Year",
    "ID",
    "Num_Vehicles",
    "Type",
    "Fuel",
    "Distance_bucket",
    "Distance_per_vehicle(km)",
];

fn csv_error(path: &Path, source: csv::Error) -> DataError {
    DataError::Csv {
        path: path.display().to_string(),
        source,
    }
}

fn read_rows<T>(path: &Path) -> Result<Vec<T>, DataError>
where
    T: for<'de> Deserialize<'de>,
{
    let mut reader = csv::Reader::from_path(path).map_err(|e| csv_error(path, e))?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row.map_err(|e| csv_error(path, e))?);
    }
    Ok(rows)
}

fn read_table<Row, Entity>(path: &Path) -> Result<Vec<Entity>, DataError>
where
    Row: for<'de> Deserialize<'de>,
    Entity: From<Row>,
{
    Ok(read_rows::<Row>(path)?.into_iter().map(Into::into).collect())
}

pub fn load_inputs(dir: &Path) -> Result<PlanInputs, DataError> {
    Ok(PlanInputs {
        vehicles: read_table::<VehicleRow, _>(&dir.join(VEHICLES_FILE))?,
        fuel_assignments: read_table::<VehicleFuelRow, _>(&dir.join(VEHICLE_FUELS_FILE))?,
        fuel_market: read_table::<FuelRow, _>(&dir.join(FUELS_FILE))?,
        demand: read_table::<DemandRow, _>(&dir.join(DEMAND_FILE))?,
        cost_profiles: read_table::<CostProfileRow, _>(&dir.join(COST_PROFILES_FILE))?,
        carbon_budgets: read_table::<CarbonBudgetRow, _>(&dir.join(CARBON_BUDGETS_FILE))?,
    })
}

pub fn read_plan(path: &Path) -> Result<Vec<OperationRecord>, DataError> {
    read_table::<PlanRow, _>(path)
}

pub fn write_plan(path: &Path, records: &[OperationRecord]) -> Result<(), DataError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;
    // Written up front so a plan with no records still carries the header.
    writer
        .write_record(PLAN_HEADERS)
        .map_err(|e| csv_error(path, e))?;
    for record in records {
        writer
            .serialize(PlanRow::from(record))
            .map_err(|e| csv_error(path, e))?;
    }
    writer.flush().map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_fixture_tables(dir: &Path) {
        fs::write(
            dir.join(VEHICLES_FILE),
            "ID,Vehicle,Size,Year,Cost ($),Yearly range (km),Distance\n\
             DSL_S1_2023,Diesel van,S1,2023,50000,10000,D1\n\
             BEV_S2_2024,Electric truck,S2,2024,90000,102000,D4\n",
        )
        .expect("write vehicles");
        fs::write(
            dir.join(VEHICLE_FUELS_FILE),
            "ID,Fuel,Consumption (unit_fuel/km)\n\
             DSL_S1_2023,Diesel,0.1\n\
             BEV_S2_2024,Electricity,0.25\n",
        )
        .expect("write vehicle fuels");
        fs::write(
            dir.join(FUELS_FILE),
            "Fuel,Year,Emissions (CO2/unit_fuel),Cost ($/unit_fuel),Cost Uncertainty (%)\n\
             Diesel,2023,2.68,1.5,3\n\
             Electricity,2024,0.2,0.3,1\n",
        )
        .expect("write fuels");
        fs::write(
            dir.join(DEMAND_FILE),
            "Year,Size,Distance,Demand (km)\n\
             2023,S1,D1,25000\n",
        )
        .expect("write demand");
        fs::write(
            dir.join(COST_PROFILES_FILE),
            "End of Year,Resale Value %,Insurance Cost %,Maintenance Cost %\n\
             1,90,5,1\n\
             2,80,6,3\n",
        )
        .expect("write cost profiles");
        fs::write(
            dir.join(CARBON_BUDGETS_FILE),
            "Year,Carbon emission CO2/kg\n\
             2023,11677957\n",
        )
        .expect("write carbon budgets");
    }

    #[test]
    fn loads_all_tables_with_original_headers() {
        let dir = TempDir::new().expect("temp dir");
        write_fixture_tables(dir.path());

        let inputs = load_inputs(dir.path()).expect("tables load");

        assert_eq!(inputs.vehicles.len(), 2);
        let diesel = &inputs.vehicles[0];
        assert_eq!(diesel.id, "DSL_S1_2023");
        assert_eq!(diesel.size, SizeClass::S1);
        assert_eq!(diesel.distance_capability, DistanceBucket::D1);
        assert_eq!(diesel.model_year, 2023);
        assert!((diesel.acquisition_cost - 50_000.0).abs() <= 1e-9);

        assert_eq!(inputs.fuel_assignments.len(), 2);
        assert!((inputs.fuel_assignments[1].consumption_per_km - 0.25).abs() <= 1e-9);

        assert_eq!(inputs.fuel_market.len(), 2);
        assert!((inputs.fuel_market[0].emission_per_unit - 2.68).abs() <= 1e-9);
        assert!((inputs.fuel_market[0].cost_per_unit - 1.5).abs() <= 1e-9);

        assert_eq!(inputs.demand.len(), 1);
        assert_eq!(inputs.cost_profiles.len(), 2);
        assert_eq!(inputs.cost_profiles[1].age, 2);
        assert_eq!(inputs.carbon_budgets.len(), 1);
    }

    #[test]
    fn missing_table_file_reports_its_path() {
        let dir = TempDir::new().expect("temp dir");
        let err = load_inputs(dir.path()).expect_err("nothing to load");
        assert!(err.to_string().contains(VEHICLES_FILE));
    }

    #[test]
    fn plan_round_trips_through_csv() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("plan.csv");
        let records = vec![
            OperationRecord {
                year: 2023,
                vehicle_id: "DSL_S1_2023".to_string(),
                num_vehicles: 3,
                kind: OperationKind::Buy,
                fuel: "Diesel".to_string(),
                distance_bucket: DistanceBucket::D1,
                distance_per_vehicle_km: 10_000.0,
            },
            OperationRecord {
                year: 2033,
                vehicle_id: "DSL_S1_2023".to_string(),
                num_vehicles: 3,
                kind: OperationKind::Sell,
                fuel: "Diesel".to_string(),
                distance_bucket: DistanceBucket::D1,
                distance_per_vehicle_km: 10_000.0,
            },
        ];

        write_plan(&path, &records).expect("plan writes");
        let reread = read_plan(&path).expect("plan reads");
        assert_eq!(reread, records);
    }

    #[test]
    fn plan_csv_uses_submission_headers() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("plan.csv");
        let records = vec![OperationRecord {
            year: 2023,
            vehicle_id: "DSL_S1_2023".to_string(),
            num_vehicles: 3,
            kind: OperationKind::Use,
            fuel: "Diesel".to_string(),
            distance_bucket: DistanceBucket::D2,
            distance_per_vehicle_km: 10_000.0,
        }];

        write_plan(&path, &records).expect("plan writes");
        let contents = fs::read_to_string(&path).expect("plan readable");
        let mut lines = contents.lines();
        assert_eq!(
            lines.next(),
            Some("Year,ID,Num_Vehicles,Type,Fuel,Distance_bucket,Distance_per_vehicle(km)")
        );
        assert_eq!(
            lines.next(),
            Some("2023,DSL_S1_2023,3,Use,Diesel,D2,10000.0")
        );
    }

    #[test]
    fn empty_plan_still_writes_header_row() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("plan.csv");

        write_plan(&path, &[]).expect("plan writes");
        let contents = fs::read_to_string(&path).expect("plan readable");
        assert_eq!(
            contents.trim_end(),
            "Year,ID,Num_Vehicles,Type,Fuel,Distance_bucket,Distance_per_vehicle(km)"
        );
        assert!(read_plan(&path).expect("plan reads").is_empty());
    }
}
