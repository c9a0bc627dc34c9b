use crate::encode::sha1_hex;
use crate::transform::{PlanContext, Report, TransformEngine, TransformError};
use model::{Cell, Field, InsertionPlan, Record};

/// A concrete, dependency-free stand-in for the XML-to-tabular
/// transformation engine this crate's `TransformEngine` trait treats as an
/// external collaborator.
///
/// It understands one small report schema (see `engine-tests`'s fixtures
/// for examples) well enough to drive every table the Database Gateway
/// touches end to end. A production deployment swaps this for a richer
/// rule engine without the core noticing, since both sides of the contract
/// are just `TransformEngine::build_plan`.
#[derive(Debug, Default)]
pub struct ReferenceTransformEngine;

impl ReferenceTransformEngine {
    pub fn new() -> Self {
        Self
    }

    fn system_attr(report: &Report, attr: &str) -> String {
        report
            .first_element_attr("system", attr)
            .unwrap_or_default()
    }

    /// The digest of stable host attributes that identifies a system
    /// externally (§ GLOSSARY `sysid`). Computed here rather than read
    /// verbatim from the report, since the report itself only carries the
    /// raw attributes.
    fn sysid(report: &Report) -> String {
        let hostname = Self::system_attr(report, "hostname");
        let arch = Self::system_attr(report, "arch");
        let numcpus = Self::system_attr(report, "numcpus");
        sha1_hex(&format!("{hostname}|{arch}|{numcpus}"))
    }

    fn build_systems(report: &Report) -> InsertionPlan {
        let mut plan = InsertionPlan::new(
            "systems",
            vec![
                Field { field_id: 1, name: "sysid".into() },
                Field { field_id: 2, name: "arch".into() },
                Field { field_id: 3, name: "numcpus".into() },
            ],
        )
        .with_key("syskey");

        let numcpus: i32 = Self::system_attr(report, "numcpus").parse().unwrap_or(0);
        plan.push_record(Record(vec![
            Cell::scalar(1, Self::sysid(report)),
            Cell::scalar(2, Self::system_attr(report, "arch")),
            Cell::scalar(3, numcpus),
        ]));
        plan
    }

    fn build_systems_hostname(report: &Report, ctx: &PlanContext) -> InsertionPlan {
        let mut plan = InsertionPlan::new(
            "systems_hostname",
            vec![
                Field { field_id: 1, name: "syskey".into() },
                Field { field_id: 2, name: "hostname".into() },
                Field { field_id: 3, name: "ipaddr".into() },
            ],
        );

        let syskey = ctx.syskey.unwrap_or(0);
        let hostname = Self::system_attr(report, "hostname");
        let ipaddr = report.first_element_attr("system", "ipaddr");

        let ipaddr_cell = match &ipaddr {
            Some(ip) => Cell::scalar(3, ip.clone()),
            None => Cell::null(3),
        };

        plan.push_record(Record(vec![
            Cell::scalar(1, syskey),
            Cell::scalar(2, hostname),
            ipaddr_cell,
        ]));
        plan
    }

    fn build_rtevalruns(report: &Report, ctx: &PlanContext) -> Result<InsertionPlan, TransformError> {
        let submid = ctx.submid.ok_or_else(|| TransformError::MissingField {
            table: "rtevalruns".into(),
            field: "submid".into(),
        })?;
        let syskey = ctx.syskey.ok_or_else(|| TransformError::MissingField {
            table: "rtevalruns".into(),
            field: "syskey".into(),
        })?;
        let rterid = ctx.rterid.ok_or_else(|| TransformError::MissingField {
            table: "rtevalruns".into(),
            field: "rterid".into(),
        })?;
        let archive_path = ctx.archive_path.ok_or_else(|| TransformError::MissingField {
            table: "rtevalruns".into(),
            field: "archive_path".into(),
        })?;

        let mut plan = InsertionPlan::new(
            "rtevalruns",
            vec![
                Field { field_id: 1, name: "submid".into() },
                Field { field_id: 2, name: "syskey".into() },
                Field { field_id: 3, name: "rterid".into() },
                Field { field_id: 4, name: "archive_path".into() },
                Field { field_id: 5, name: "rtevalversion".into() },
                Field { field_id: 6, name: "duration".into() },
                Field { field_id: 7, name: "kernel".into() },
            ],
        );

        let duration: i32 = report
            .first_element_attr("run", "duration")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);

        plan.push_record(Record(vec![
            Cell::scalar(1, submid as i64),
            Cell::scalar(2, syskey),
            Cell::scalar(3, rterid),
            Cell::scalar(4, archive_path.to_string()),
            Cell::scalar(5, report.first_element_attr("run", "rtevalversion").unwrap_or_default()),
            Cell::scalar(6, duration),
            Cell::scalar(7, report.first_element_attr("run", "kernel").unwrap_or_default()),
        ]));
        Ok(plan)
    }

    fn build_rtevalruns_details(report: &Report, ctx: &PlanContext) -> Result<InsertionPlan, TransformError> {
        let rterid = ctx.rterid.ok_or_else(|| TransformError::MissingField {
            table: "rtevalruns_details".into(),
            field: "rterid".into(),
        })?;

        let mut plan = InsertionPlan::new(
            "rtevalruns_details",
            vec![
                Field { field_id: 1, name: "rterid".into() },
                Field { field_id: 2, name: "arch".into() },
                Field { field_id: 3, name: "numcpus".into() },
                Field { field_id: 4, name: "report_blob".into() },
            ],
        );

        let numcpus: i32 = Self::system_attr(report, "numcpus").parse().unwrap_or(0);
        plan.push_record(Record(vec![
            Cell::scalar(1, rterid),
            Cell::scalar(2, Self::system_attr(report, "arch")),
            Cell::scalar(3, numcpus),
            Cell::xmlblob(4, report.raw_xml().to_string()),
        ]));
        Ok(plan)
    }

    fn build_cyclic_statistics(report: &Report, ctx: &PlanContext) -> Result<InsertionPlan, TransformError> {
        let rterid = ctx.rterid.ok_or_else(|| TransformError::MissingField {
            table: "cyclic_statistics".into(),
            field: "rterid".into(),
        })?;

        let mut plan = InsertionPlan::new(
            "cyclic_statistics",
            vec![
                Field { field_id: 1, name: "rterid".into() },
                Field { field_id: 2, name: "core_id".into() },
                Field { field_id: 3, name: "min".into() },
                Field { field_id: 4, name: "max".into() },
                Field { field_id: 5, name: "mean".into() },
                Field { field_id: 6, name: "samples".into() },
            ],
        );

        for core in report.elements_by_tag("core") {
            let Some(core_id) = core.get("id").and_then(|s| s.parse::<i32>().ok()) else {
                continue;
            };
            if !core.contains_key("min") {
                continue;
            }
            let get_f64 = |key: &str| core.get(key).and_then(|s| s.parse::<f64>().ok()).unwrap_or(0.0);
            let get_i64 = |key: &str| core.get(key).and_then(|s| s.parse::<i64>().ok()).unwrap_or(0);
            plan.push_record(Record(vec![
                Cell::scalar(1, rterid),
                Cell::scalar(2, core_id),
                Cell::scalar(3, get_f64("min")),
                Cell::scalar(4, get_f64("max")),
                Cell::scalar(5, get_f64("mean")),
                Cell::scalar(6, get_i64("samples")),
            ]));
        }
        Ok(plan)
    }

    fn build_cyclic_histogram(report: &Report, ctx: &PlanContext) -> Result<InsertionPlan, TransformError> {
        let rterid = ctx.rterid.ok_or_else(|| TransformError::MissingField {
            table: "cyclic_histogram".into(),
            field: "rterid".into(),
        })?;

        let mut plan = InsertionPlan::new(
            "cyclic_histogram",
            vec![
                Field { field_id: 1, name: "rterid".into() },
                Field { field_id: 2, name: "core_id".into() },
                Field { field_id: 3, name: "buckets".into() },
            ],
        );

        for core in report.elements_by_tag("core") {
            let Some(core_id) = core.get("id").and_then(|s| s.parse::<i32>().ok()) else {
                continue;
            };
            let Some(raw_buckets) = core.get("buckets") else {
                continue;
            };
            let bucket_cells: Vec<Cell> = raw_buckets
                .split(',')
                .filter(|s| !s.is_empty())
                .map(|s| Cell::scalar(3, s.trim().parse::<i64>().unwrap_or(0)))
                .collect();
            plan.push_record(Record(vec![
                Cell::scalar(1, rterid),
                Cell::scalar(2, core_id),
                Cell::array(3, bucket_cells),
            ]));
        }
        Ok(plan)
    }

    fn build_cyclic_rawdata(report: &Report, ctx: &PlanContext) -> Result<InsertionPlan, TransformError> {
        let rterid = ctx.rterid.ok_or_else(|| TransformError::MissingField {
            table: "cyclic_rawdata".into(),
            field: "rterid".into(),
        })?;

        let mut plan = InsertionPlan::new(
            "cyclic_rawdata",
            vec![
                Field { field_id: 1, name: "rterid".into() },
                Field { field_id: 2, name: "core_id".into() },
                Field { field_id: 3, name: "samples".into() },
            ],
        );

        for core in report.elements_by_tag("core") {
            let Some(core_id) = core.get("id").and_then(|s| s.parse::<i32>().ok()) else {
                continue;
            };
            let Some(raw_samples) = core.get("samples_raw") else {
                continue;
            };
            let sample_cells: Vec<Cell> = raw_samples
                .split(',')
                .filter(|s| !s.is_empty())
                .map(|s| Cell::scalar(3, s.trim().parse::<f64>().unwrap_or(0.0)))
                .collect();
            plan.push_record(Record(vec![
                Cell::scalar(1, rterid),
                Cell::scalar(2, core_id),
                Cell::array(3, sample_cells),
            ]));
        }
        Ok(plan)
    }
}

impl TransformEngine for ReferenceTransformEngine {
    fn build_plan(
        &self,
        table: &str,
        report: &Report,
        ctx: &PlanContext,
    ) -> Result<InsertionPlan, TransformError> {
        match table {
            "systems" => Ok(Self::build_systems(report)),
            "systems_hostname" => Ok(Self::build_systems_hostname(report, ctx)),
            "rtevalruns" => Self::build_rtevalruns(report, ctx),
            "rtevalruns_details" => Self::build_rtevalruns_details(report, ctx),
            "cyclic_statistics" => Self::build_cyclic_statistics(report, ctx),
            "cyclic_histogram" => Self::build_cyclic_histogram(report, ctx),
            "cyclic_rawdata" => Self::build_cyclic_rawdata(report, ctx),
            other => Err(TransformError::UnknownTable(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<rtevalreport>
        <system hostname="host1" ipaddr="10.0.0.1" arch="x86_64" numcpus="2"/>
        <run rtevalversion="3.2" duration="600" kernel="6.1.0"/>
        <core id="0" min="1.0" max="120.0" mean="3.4" samples="600000" buckets="1,2,3" samples_raw="0.1,0.2"/>
    </rtevalreport>"#;

    fn sample_report() -> Report {
        Report::parse(SAMPLE.to_string()).unwrap()
    }

    #[test]
    fn sysid_is_stable_across_identical_attributes() {
        let report = sample_report();
        let a = ReferenceTransformEngine::sysid(&report);
        let b = ReferenceTransformEngine::sysid(&report);
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn systems_plan_field_text_matches_computed_sysid() {
        let report = sample_report();
        let plan = ReferenceTransformEngine::build_systems(&report);
        assert_eq!(
            plan.field_text(0, "sysid"),
            Some(ReferenceTransformEngine::sysid(&report))
        );
    }

    #[test]
    fn rtevalruns_requires_context_identifiers() {
        let report = sample_report();
        let ctx = PlanContext::default();
        assert!(ReferenceTransformEngine::build_rtevalruns(&report, &ctx).is_err());
    }

    #[test]
    fn cyclic_histogram_produces_one_array_cell_per_core() {
        let report = sample_report();
        let ctx = PlanContext {
            rterid: Some(7),
            ..Default::default()
        };
        let plan = ReferenceTransformEngine::build_cyclic_histogram(&report, &ctx).unwrap();
        assert_eq!(plan.records.len(), 1);
    }

    #[test]
    fn missing_measurement_elements_yield_an_empty_plan() {
        let report = Report::parse("<rtevalreport><system hostname=\"h\" arch=\"x86_64\" numcpus=\"1\"/></rtevalreport>".to_string()).unwrap();
        let ctx = PlanContext {
            rterid: Some(1),
            ..Default::default()
        };
        let plan = ReferenceTransformEngine::build_cyclic_rawdata(&report, &ctx).unwrap();
        assert!(plan.is_empty());
    }
}
