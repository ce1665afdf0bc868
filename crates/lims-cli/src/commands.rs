//! Command implementations. Each returns the process exit code.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, error, info, info_span, trace, warn};

use lims_batch::{BatchError, BatchService, CreateBatchRequest, flatten, layout};
use lims_ingest::{group_by_sample, read_abif, read_genemapper};
use lims_model::{
    BatchKind, BatchNumber, BatchRepository, CaseNumber, LabNumber, Sample, WorkflowStatus,
};
use lims_paternity::{PaternityCalculator, PaternityError, RoleAssignment, identify_roles};
use lims_store::{JsonStore, StoreError};
use lims_workflow::{
    BulkTransitionRequest, BulkTransitionResponse, CancelToken, ResourceLocks, WorkflowEngine,
};

use crate::cli::{CreateArgs, FsaArgs, IngestArgs, PaternityArgs, StatusArgs};
use crate::config::LimsConfig;
use crate::logging::redact_value;
use crate::render::{
    abif_table, batch_summary, conclusion_line, plate_table, readings_table, report_table,
    samples_table, skipped_table,
};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
/// The request was understood but refused (invalid transition, empty plate,
/// ambiguous roles).
pub const EXIT_REJECTED: i32 = 2;

/// Resolved configuration shared by the store-backed commands.
pub struct Session {
    pub config: LimsConfig,
}

impl Session {
    pub fn new(config: LimsConfig) -> Self {
        Self { config }
    }

    fn open_store(&self) -> Result<Arc<JsonStore>> {
        let dir = &self.config.store_dir;
        let store = JsonStore::open(dir)
            .with_context(|| format!("open store {}", dir.display()))?;
        Ok(Arc::new(store))
    }
}

/// The first store error anywhere in the cause chain of `error`.
pub fn store_error(error: &anyhow::Error) -> Option<&StoreError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<StoreError>())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn run_ingest(args: &IngestArgs) -> Result<i32> {
    let outcome = read_genemapper(&args.file)
        .with_context(|| format!("read allele table {}", args.file.display()))?;
    info!(
        readings = outcome.readings.len(),
        skipped = outcome.skipped_count(),
        "allele table parsed"
    );
    if args.json {
        print_json(&outcome)?;
        return Ok(EXIT_OK);
    }

    let skipped = outcome.skipped;
    let groups = group_by_sample(outcome.readings);
    println!("{}", readings_table(&groups));
    if !skipped.is_empty() {
        println!();
        println!("Skipped {} row(s):", skipped.len());
        println!("{}", skipped_table(&skipped));
    }
    Ok(EXIT_OK)
}

pub fn run_paternity(args: &PaternityArgs) -> Result<i32> {
    let outcome = read_genemapper(&args.file)
        .with_context(|| format!("read allele table {}", args.file.display()))?;
    if !outcome.is_complete() {
        warn!(skipped = outcome.skipped_count(), "rows skipped in allele table");
    }
    let groups = group_by_sample(outcome.readings);
    for (sample, readings) in &groups {
        trace!(sample = redact_value(sample), loci = readings.len(), "sample readings");
    }

    let roles = match (&args.child, &args.parent) {
        (Some(child), Some(parent)) => RoleAssignment::new(child.as_str(), parent.as_str())?,
        _ => match identify_roles(groups.keys().map(String::as_str)) {
            Ok(roles) => roles,
            Err(PaternityError::AmbiguousRoles { available }) => {
                eprintln!("error: cannot tell child and alleged parent apart");
                eprintln!("available sample ids: {}", available.join(", "));
                eprintln!("hint: name them with --child and --parent");
                return Ok(EXIT_REJECTED);
            }
            Err(err) => return Err(err.into()),
        },
    };

    let report = PaternityCalculator::new().compare_groups(&groups, &roles)?;
    if args.json {
        print_json(&report)?;
    } else {
        println!("{}", report_table(&report));
        println!("{}", conclusion_line(&report));
    }
    Ok(EXIT_OK)
}

#[derive(Serialize)]
struct FsaEntry<'a> {
    file: String,
    #[serde(flatten)]
    summary: &'a lims_ingest::AbifSummary,
}

pub fn run_fsa(args: &FsaArgs) -> Result<i32> {
    let mut summaries: Vec<(PathBuf, lims_ingest::AbifSummary)> = Vec::new();
    let mut failed = 0usize;
    for path in &args.files {
        match read_abif(path) {
            Ok(file) => summaries.push((path.clone(), file.summary())),
            Err(err) => {
                error!(path = %path.display(), error = %err, "unreadable fsa file");
                eprintln!("error: {}: {err}", path.display());
                failed += 1;
            }
        }
    }

    if args.json {
        let entries: Vec<FsaEntry<'_>> = summaries
            .iter()
            .map(|(path, summary)| FsaEntry {
                file: path.display().to_string(),
                summary,
            })
            .collect();
        print_json(&entries)?;
    } else if !summaries.is_empty() {
        println!("{}", abif_table(&summaries));
    }
    Ok(if failed > 0 { EXIT_FAILURE } else { EXIT_OK })
}

pub fn run_samples_import(session: &Session, file: &Path) -> Result<i32> {
    let content =
        fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
    let samples: Vec<Sample> = serde_json::from_str(&content)
        .with_context(|| format!("parse samples from {}", file.display()))?;
    for sample in &samples {
        debug!(
            lab_number = %sample.lab_number,
            name = redact_value(sample.name.as_deref().unwrap_or_default()),
            "importing sample"
        );
    }
    let store = session.open_store()?;
    let count = store.import_samples(samples).context("import samples")?;
    println!("Imported {count} sample(s) into {}", store.dir().display());
    Ok(EXIT_OK)
}

pub fn run_samples_list(session: &Session, status: Option<&str>, json: bool) -> Result<i32> {
    let status: Option<WorkflowStatus> = status.map(str::parse).transpose()?;
    let store = session.open_store()?;
    let samples: Vec<Sample> = store
        .samples()?
        .into_iter()
        .filter(|sample| status.is_none_or(|s| sample.workflow_status == s))
        .collect();
    if json {
        print_json(&samples)?;
    } else {
        println!("{}", samples_table(&samples));
    }
    Ok(EXIT_OK)
}

fn batch_request(session: &Session, args: &CreateArgs) -> Result<CreateBatchRequest> {
    let mut request = CreateBatchRequest::new(
        BatchKind::from(args.kind),
        session.config.operator(args.operator.as_deref()),
    );
    request.case_numbers = args
        .cases
        .iter()
        .map(|case| CaseNumber::new(case.as_str()))
        .collect::<Result<_, _>>()?;
    request.lab_numbers = args
        .samples
        .iter()
        .map(|lab| LabNumber::new(lab.as_str()))
        .collect::<Result<_, _>>()?;
    request.note.clone_from(&args.note);
    Ok(request)
}

fn batch_rejected(err: BatchError) -> Result<i32> {
    if err.is_recoverable() {
        warn!(error = %err, "batch request rejected");
        eprintln!("error: {err}");
        Ok(EXIT_REJECTED)
    } else {
        Err(err).context("create batch")
    }
}

pub fn run_batch_create(session: &Session, args: &CreateArgs) -> Result<i32> {
    let request = batch_request(session, args)?;
    let store = session.open_store()?;
    let service = BatchService::new(
        Arc::clone(&store),
        Arc::clone(&store),
        Arc::new(ResourceLocks::new()),
    )
    .with_policies(session.config.policies());

    if args.dry_run {
        let span = info_span!("preview", kind = %request.kind);
        let _span = span.enter();
        let groups = match service.preview(&request) {
            Ok(groups) => groups,
            Err(err) => return batch_rejected(err),
        };
        let ordered = flatten(&groups);
        if ordered.is_empty() {
            return batch_rejected(BatchError::EmptySelection { kind: request.kind });
        }
        let map = match layout(&ordered, service.policies().for_kind(request.kind)) {
            Ok(map) => map,
            Err(err) => return batch_rejected(err.into()),
        };
        if args.json {
            print_json(&map)?;
        } else {
            println!(
                "Preview of a {} plate: {} samples in {} cases (nothing committed)",
                request.kind,
                ordered.len(),
                groups.len()
            );
            println!("{}", plate_table(&map));
        }
        return Ok(EXIT_OK);
    }

    let batch = match service.create_batch(&request, &CancelToken::new()) {
        Ok(batch) => batch,
        Err(err) => return batch_rejected(err),
    };
    if args.json {
        print_json(&batch)?;
    } else {
        println!("{}", batch_summary(&batch));
        println!("{}", plate_table(&batch.well_map));
    }
    Ok(EXIT_OK)
}

pub fn run_batch_show(session: &Session, batch_number: &str, json: bool) -> Result<i32> {
    let number = BatchNumber::new(batch_number)?;
    let store = session.open_store()?;
    let Some(batch) = store.find_batch(&number)? else {
        bail!("batch {number} not found in {}", store.dir().display());
    };
    if json {
        print_json(&batch.well_map)?;
    } else {
        println!("{}", batch_summary(&batch));
        println!("{}", plate_table(&batch.well_map));
    }
    Ok(EXIT_OK)
}

pub fn run_status(session: &Session, args: &StatusArgs) -> Result<i32> {
    let request = BulkTransitionRequest {
        sample_ids: args.lab_numbers.clone(),
        workflow_status: args.status.clone(),
        notes: args.note.clone(),
    };
    let operator = session.config.operator(args.operator.as_deref());
    let engine = WorkflowEngine::new(session.open_store()?);
    let response = engine
        .handle_bulk_request(&request, &operator, &CancelToken::new())
        .context("update workflow status")?;

    if args.json {
        print_json(&response)?;
    }
    match response {
        BulkTransitionResponse::Updated { updated } => {
            if !args.json {
                println!("Moved {} sample(s) to {}", updated.len(), args.status);
                println!("{}", samples_table(&updated));
            }
            Ok(EXIT_OK)
        }
        BulkTransitionResponse::Rejected { error } => {
            if !args.json {
                eprintln!("rejected: {}", error.message);
                eprintln!("no sample was changed");
            }
            Ok(EXIT_REJECTED)
        }
    }
}
