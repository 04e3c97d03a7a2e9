use crate::infra::{build_service, detector, AppService, InMemoryAnalysisRepository};
use clap::Args;
use shoreline::config::AppConfig;
use shoreline::error::AppError;
use shoreline::workflows::cleanup::{AnalysisRecord, CleanupServiceError, EventDetails, ImageUpload};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct AnalyzeArgs {
    /// Photograph of the littered beach
    pub(crate) image: PathBuf,
    /// Free-form location stored with the analysis
    #[arg(long)]
    pub(crate) location: Option<String>,
    /// Meeting place for the cleanup; together with --activity-date composes a recruitment post
    #[arg(long)]
    pub(crate) meeting_place: Option<String>,
    /// Date and time of the cleanup activity
    #[arg(long)]
    pub(crate) activity_date: Option<String>,
    /// Extra note appended to the recruitment post
    #[arg(long)]
    pub(crate) note: Option<String>,
    /// Publish the recruitment after composing it
    #[arg(long)]
    pub(crate) publish: bool,
}

pub(crate) async fn run_analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    tokio::task::spawn_blocking(move || analyze_blocking(config, args))
        .await
        .map_err(|err| AppError::Io(std::io::Error::other(err)))?
}

fn analyze_blocking(config: AppConfig, args: AnalyzeArgs) -> Result<(), AppError> {
    let AnalyzeArgs {
        image,
        location,
        meeting_place,
        activity_date,
        note,
        publish,
    } = args;

    let bytes = std::fs::read(&image)?;
    let file_name = image
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload")
        .to_string();

    let repository = Arc::new(InMemoryAnalysisRepository::default());
    let service = build_service(&config, detector(&config.detector), repository);

    let record = service.analyze(ImageUpload { file_name, bytes }, location)?;
    render_analysis(&record);

    let event = match (meeting_place, activity_date) {
        (Some(meeting_place), Some(activity_date)) => EventDetails {
            activity_date,
            meeting_place,
            additional_note: note,
        },
        (None, None) => return Ok(()),
        _ => {
            return Err(CleanupServiceError::Validation(
                "--meeting-place and --activity-date must be given together".to_string(),
            )
            .into())
        }
    };

    compose_and_publish(&service, &record, event, publish)
}

fn compose_and_publish(
    service: &AppService,
    record: &AnalysisRecord,
    event: EventDetails,
    publish: bool,
) -> Result<(), AppError> {
    let draft = service.generate_recruitment(record.id, event)?;

    println!("\nRecruitment post");
    if let Some(reason) = draft.text.reason() {
        println!("(composition degraded: {reason}; nothing was saved)");
    }
    let text = draft.text.value();
    println!("{}\n", text.title);
    println!("{}", text.content);

    if !publish {
        return Ok(());
    }
    if draft.text.is_degraded() {
        println!("\nSkipping publish: no recruitment content was saved");
        return Ok(());
    }

    let published = service.publish(record.id)?;
    match published.published_at {
        Some(at) => println!("\nPublished as {} at {}", published.status, at.to_rfc3339()),
        None => println!("\nStatus: {}", published.status),
    }
    Ok(())
}

fn render_analysis(record: &AnalysisRecord) {
    println!("Analysis {} ({})", record.id, record.image_name);
    if let Some(location) = &record.location {
        println!("Location: {location}");
    }
    println!("Annotated image: {}", record.image.public_url());

    println!("\nTrash inventory");
    if record.trash_summary.is_empty() {
        println!("- nothing detected");
    }
    for (category, count) in record.trash_summary.iter() {
        match record.display_names.get(category) {
            Some(label) => println!("- {label} ({category}): {count}"),
            None => println!("- {category}: {count}"),
        }
    }

    println!("\nRecommended resources");
    println!("- volunteers: {}", record.required_people);
    println!("- estimated time: {} min", record.estimated_time_min);
    for (tool, quantity) in &record.tools {
        println!("- {tool}: {quantity}");
    }
}
