use anyhow::{Context, Result, bail};
use pegboard_application::{CanvasService, TAB_STRIP_PX};
use pegboard_core::canvas::{Canvas, SnapshotRepository};
use pegboard_core::layout::{ContainerSize, find_free_position};
use pegboard_infrastructure::{ConfigService, JsonSnapshotRepository, PegboardPaths};

async fn load_service(paths: &PegboardPaths) -> (CanvasService, JsonSnapshotRepository) {
    let config = ConfigService::new(paths.config_file()).get_config();
    let repository = JsonSnapshotRepository::new(paths.snapshot_file());
    let service = CanvasService::restore(&repository, &config).await;
    (service, repository)
}

fn pane_summary(canvas: &Canvas) -> (usize, usize, usize) {
    let chats = canvas.chat_boxes.iter().filter(|b| !b.archived).count();
    let texts = canvas.text_boxes.iter().filter(|b| !b.archived).count();
    let archived = canvas.chat_boxes.iter().filter(|b| b.archived).count()
        + canvas.text_boxes.iter().filter(|b| b.archived).count();
    (chats, texts, archived)
}

pub async fn list(paths: &PegboardPaths, json: bool) -> Result<()> {
    let (service, _) = load_service(paths).await;
    let snapshot = service.snapshot();

    if json {
        let rendered =
            serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;
        println!("{}", rendered);
        return Ok(());
    }

    for canvas in &snapshot.canvases {
        let (chats, texts, archived) = pane_summary(canvas);
        let marker = if canvas.id == snapshot.active_canvas_id {
            "*"
        } else {
            " "
        };
        println!(
            "{} {:<38} {:<20} chat={} text={} archived={}",
            marker, canvas.id, canvas.name, chats, texts, archived
        );
    }
    if snapshot.is_locked {
        println!("(active canvas is locked)");
    }
    Ok(())
}

pub async fn place(
    paths: &PegboardPaths,
    width: i32,
    height: i32,
    canvas_id: Option<&str>,
) -> Result<()> {
    if width <= 0 || height <= 0 {
        bail!("Pane size must be positive, got {}x{}", width, height);
    }

    let (service, _) = load_service(paths).await;
    let canvas = match canvas_id {
        Some(id) => service
            .snapshot()
            .canvases
            .iter()
            .find(|c| c.id == id)
            .with_context(|| format!("Canvas not found: {}", id))?,
        None => service
            .active_canvas()
            .context("Snapshot has no active canvas")?,
    };

    let point = find_free_position(&canvas.placed_panes(), width, height);
    println!("{} {}", point.x, point.y);
    Ok(())
}

pub async fn fit(paths: &PegboardPaths, width: f64, height: f64) -> Result<()> {
    if width <= 0.0 || height <= 0.0 {
        bail!("Window size must be positive, got {}x{}", width, height);
    }

    let (mut service, _) = load_service(paths).await;
    service.fit_to_screen(ContainerSize::new(width, height));
    let viewport = service.viewport();
    println!(
        "zoom={:.3} pan=({:.1}, {:.1}) tab_strip={}px",
        viewport.zoom(),
        viewport.pan().x,
        viewport.pan().y,
        TAB_STRIP_PX
    );
    Ok(())
}

/// Restoring already drops expired archived panes; saving makes it stick.
pub async fn purge(paths: &PegboardPaths) -> Result<()> {
    let (service, repository) = load_service(paths).await;
    repository
        .save(service.snapshot())
        .await
        .with_context(|| format!("Failed to write {}", paths.snapshot_file().display()))?;

    let archived: usize = service
        .snapshot()
        .canvases
        .iter()
        .map(|c| pane_summary(c).2)
        .sum();
    println!("{} archived panes kept", archived);
    Ok(())
}
