use anyhow::Context;
use conjcore::contracts::{Conjunction, NoradId, ThreatLevel};
use conjcore::scene::FrameState;
use conjcore::telemetry::MetricsRecorder;
use conjcore::tracking::BoardSnapshot;
use conjcore::{
    AssetPositionSampler, ConjunctionBoard, HttpMissionService, MissionConfig, MissionScene,
    MissionService, ScreeningJobTracker,
};
use iced::{
    time::{self, Instant},
    widget::{
        button, canvas::Canvas, column, row, scrollable, text, text_input, Column, Container,
    },
    Alignment, Element, Length, Subscription, Task, Theme,
};
use log::info;
use std::{env, future::Future, sync::Arc, time::Duration};
use tokio::runtime::Runtime;

mod scene_view;

use scene_view::{threat_color, SceneView};

/// Overrides the screening service base URL.
const SERVICE_URL_ENV: &str = "CONJ_SERVICE_URL";
/// Comma-separated NORAD ids of protected assets to keep on screen.
const PROTECTED_ASSETS_ENV: &str = "CONJ_PROTECTED_ASSETS";
const FRAME_PERIOD: Duration = Duration::from_millis(33);
/// Longest frame step fed to the animation after a stall.
const MAX_FRAME_STEP: f64 = 0.25;
const HISTORY_LIMIT: usize = 20;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let service_url =
        env::var(SERVICE_URL_ENV).unwrap_or_else(|_| MissionConfig::default().service_url);
    let mut config = MissionConfig::default().with_service_url(service_url);
    if let Ok(list) = env::var(PROTECTED_ASSETS_ENV) {
        config.protected_assets = parse_norad_ids(&list)
            .with_context(|| format!("parsing {}", PROTECTED_ASSETS_ENV))?;
    }
    let runtime = Arc::new(Runtime::new().context("creating mission runtime")?);
    let service: Arc<dyn MissionService> =
        Arc::new(HttpMissionService::from_config(&config).context("building service client")?);
    info!("visualizer using screening service at {}", config.service_url);

    let mission = Mission {
        runtime,
        service,
        config,
    };
    iced::application(
        move || Visualizer::boot(mission.clone()),
        Visualizer::update,
        Visualizer::view,
    )
    .title(application_title)
    .subscription(application_subscription)
    .theme(application_theme)
    .run()
    .context("running visualizer")
}

fn application_title(_: &Visualizer) -> String {
    "Conjunction Mission Tracker".into()
}

fn application_subscription(_: &Visualizer) -> Subscription<Message> {
    time::every(FRAME_PERIOD).map(Message::Frame)
}

fn application_theme(_: &Visualizer) -> Theme {
    Theme::Dark
}

/// Runtime and service handle shared by every core component.
#[derive(Clone)]
struct Mission {
    runtime: Arc<Runtime>,
    service: Arc<dyn MissionService>,
    config: MissionConfig,
}

struct Visualizer {
    mission: Mission,
    metrics: Arc<MetricsRecorder>,
    board: Arc<ConjunctionBoard>,
    tracker: ScreeningJobTracker,
    scene: Arc<MissionScene>,
    sampler: AssetPositionSampler,
    form: ScreeningForm,
    snapshot: BoardSnapshot,
    frame: FrameState,
    assets: Vec<(NoradId, conjcore::math::ScenePosition)>,
    job_text: Option<String>,
    last_frame: Option<Instant>,
    status: String,
    history: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Message {
    Frame(Instant),
    FormFieldChanged(FormField, String),
    RunScreening,
    ScreeningStarted(Result<String, String>),
    ReloadConjunctions,
    ConjunctionsReloaded(Result<usize, String>),
    SelectConjunction(u64),
    SelectionSettled(Result<u64, String>),
    ClearSelection,
    ThreatsRefreshed(Result<Option<usize>, String>),
}

#[derive(Debug, Clone, Copy)]
pub enum FormField {
    AssetIds,
    WindowDays,
    ThresholdKm,
}

impl Visualizer {
    fn boot(mission: Mission) -> (Self, Task<Message>) {
        let metrics = Arc::new(MetricsRecorder::new());
        let board = Arc::new(ConjunctionBoard::new());
        let tracker = ScreeningJobTracker::new(
            Arc::clone(&mission.service),
            Arc::clone(&board),
            &mission.config,
            Arc::clone(&metrics),
        );
        let scene = Arc::new(MissionScene::new(
            Arc::clone(&mission.service),
            &mission.config,
            Arc::clone(&metrics),
        ));
        let sampler = AssetPositionSampler::new(
            Arc::clone(&mission.service),
            mission.config.sample_period(),
            Arc::clone(&metrics),
        );
        if !mission.config.protected_assets.is_empty() {
            let _guard = mission.runtime.enter();
            sampler.track(mission.config.protected_assets.clone());
        }
        let frame = scene.frame();
        let visualizer = Visualizer {
            mission,
            metrics,
            board,
            tracker,
            scene,
            sampler,
            form: ScreeningForm::default(),
            snapshot: BoardSnapshot::default(),
            frame,
            assets: Vec::new(),
            job_text: None,
            last_frame: None,
            status: "Loading conjunctions...".into(),
            history: Vec::new(),
        };
        let load = visualizer.reload_board();
        (visualizer, load)
    }

    fn update(state: &mut Self, message: Message) -> Task<Message> {
        match message {
            Message::Frame(now) => state.on_frame(now),
            Message::FormFieldChanged(field, value) => {
                state.form.update_field(field, value);
                Task::none()
            }
            Message::RunScreening => match state.form.parse() {
                Ok(request) => {
                    let tracker = state.tracker.clone();
                    state.push_history(format!(
                        "Screening requested: {} days, {} km",
                        request.window_days, request.distance_threshold_km
                    ));
                    state.spawn(
                        async move {
                            tracker
                                .start(
                                    request.asset_ids,
                                    request.window_days,
                                    request.distance_threshold_km,
                                )
                                .await
                                .map(|job_id| job_id.to_string())
                                .map_err(|err| err.to_string())
                        },
                        |result| Message::ScreeningStarted(result.and_then(|started| started)),
                    )
                }
                Err(err) => {
                    state.status = format!("Form error: {err}");
                    Task::none()
                }
            },
            Message::ScreeningStarted(Ok(job_id)) => {
                state.push_history(format!("Tracking job {job_id}"));
                Task::none()
            }
            Message::ScreeningStarted(Err(err)) => {
                state.status = format!("Screening not started: {err}");
                state.push_history(state.status.clone());
                Task::none()
            }
            Message::ReloadConjunctions => state.reload_board(),
            Message::ConjunctionsReloaded(Ok(count)) => {
                state.status = format!("{count} conjunctions loaded");
                Task::none()
            }
            Message::ConjunctionsReloaded(Err(err)) => {
                state.status = format!("Conjunction reload failed: {err}");
                Task::none()
            }
            Message::SelectConjunction(id) => {
                let Some(conjunction) = state.snapshot.find(id).cloned() else {
                    return Task::none();
                };
                state.push_history(format!("Selected {}", conjunction.label()));
                let scene = Arc::clone(&state.scene);
                state.spawn(
                    async move { scene.select(&conjunction).await.value() },
                    Message::SelectionSettled,
                )
            }
            Message::SelectionSettled(Ok(_)) => Task::none(),
            Message::SelectionSettled(Err(err)) => {
                state.status = format!("Selection task failed: {err}");
                Task::none()
            }
            Message::ClearSelection => {
                state.scene.clear_selection();
                Task::none()
            }
            Message::ThreatsRefreshed(Ok(Some(count))) => {
                state.push_history(format!("{count} threat markers placed"));
                Task::none()
            }
            Message::ThreatsRefreshed(Ok(None)) => Task::none(),
            Message::ThreatsRefreshed(Err(err)) => {
                state.status = format!("Threat refresh failed: {err}");
                Task::none()
            }
        }
    }

    fn on_frame(&mut self, now: Instant) -> Task<Message> {
        let dt = self
            .last_frame
            .map(|last| now.saturating_duration_since(last).as_secs_f64())
            .unwrap_or(0.0)
            .min(MAX_FRAME_STEP);
        self.last_frame = Some(now);
        self.frame = self.scene.advance_frame(dt);
        self.job_text = self.tracker.status_text();

        let mut assets: Vec<_> = self.sampler.positions().into_iter().collect();
        assets.sort_by_key(|(norad_id, _)| *norad_id);
        self.assets = assets;

        let snapshot = self.board.snapshot();
        if snapshot.generation == self.snapshot.generation {
            return Task::none();
        }
        self.snapshot = snapshot;
        self.on_board_replaced()
    }

    /// Re-targets the sampler and threat markers at the new conjunction list.
    fn on_board_replaced(&mut self) -> Task<Message> {
        let assets = tracked_assets(
            &self.mission.config.protected_assets,
            &self.snapshot.conjunctions,
        );
        {
            let _guard = self.mission.runtime.enter();
            self.sampler.track(assets);
        }
        if let Some(selected) = self.scene.selected() {
            if self.snapshot.find(selected).is_none() {
                self.scene.clear_selection();
            }
        }

        let scene = Arc::clone(&self.scene);
        let conjunctions: Vec<Conjunction> = self.snapshot.conjunctions.clone();
        self.spawn(
            async move { scene.refresh_threats(&conjunctions).await },
            Message::ThreatsRefreshed,
        )
    }

    fn reload_board(&self) -> Task<Message> {
        let board = Arc::clone(&self.board);
        let service = Arc::clone(&self.mission.service);
        self.spawn(
            async move {
                board
                    .reload(service.as_ref())
                    .await
                    .map_err(|err| err.to_string())
            },
            |result| Message::ConjunctionsReloaded(result.and_then(|loaded| loaded)),
        )
    }

    /// Runs `future` on the mission runtime and reports its output as a message.
    fn spawn<T, F>(
        &self,
        future: F,
        done: impl FnOnce(Result<T, String>) -> Message + Send + 'static,
    ) -> Task<Message>
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let handle = self.mission.runtime.spawn(future);
        Task::perform(
            async move { handle.await.map_err(|err| err.to_string()) },
            done,
        )
    }

    fn view(state: &Self) -> Element<'_, Message> {
        let metrics = state.metrics.snapshot();
        let summary = &state.snapshot.summary;
        let threat_line = ThreatLevel::ALL.iter().fold(
            row![text(format!("Active: {}", summary.total)).size(14)].spacing(12),
            |line, level| {
                line.push(
                    text(format!("{} {}", level.as_str(), summary.count(*level)))
                        .size(14)
                        .color(threat_color(*level)),
                )
            },
        );

        let form_column = column![
            text("Screening").size(26),
            text_input("Asset ids (blank = all)", &state.form.asset_ids)
                .on_input(|value| Message::FormFieldChanged(FormField::AssetIds, value))
                .padding(6),
            text_input("Window (days)", &state.form.window_days)
                .on_input(|value| Message::FormFieldChanged(FormField::WindowDays, value))
                .padding(6),
            text_input("Threshold (km)", &state.form.threshold_km)
                .on_input(|value| Message::FormFieldChanged(FormField::ThresholdKm, value))
                .padding(6),
            row![
                button("Run screening")
                    .on_press(Message::RunScreening)
                    .padding(10),
                button("Reload").on_press(Message::ReloadConjunctions).padding(10),
            ]
            .spacing(8),
            text(state.job_text.clone().unwrap_or_else(|| "No screening job".into())).size(16),
            text(&state.status).size(14),
            text(format!(
                "polls {} | transport failures {} | view failures {} | samples {}",
                metrics.polls,
                metrics.transport_failures,
                metrics.visualization_failures,
                metrics.position_samples
            ))
            .size(12),
            text("Activity log").size(16),
            Container::new(scrollable(history_list(&state.history)).height(Length::Fixed(160.0)))
                .padding(6),
        ]
        .spacing(10)
        .padding(16)
        .width(Length::Fixed(360.0));

        let selected = state.frame.selected;
        let list = if state.snapshot.conjunctions.is_empty() {
            Column::new().push(text("No conjunctions").size(12))
        } else {
            state
                .snapshot
                .conjunctions
                .iter()
                .fold(Column::new().spacing(4), |col, conjunction| {
                    let marker = if selected == Some(conjunction.id) { "> " } else { "" };
                    col.push(
                        button(
                            text(format!(
                                "{}{} | miss {} | pc {} | TCA {}",
                                marker,
                                conjunction.label(),
                                conjunction.miss_distance_text(),
                                conjunction.probability_text(),
                                conjunction.tca_text()
                            ))
                            .size(12)
                            .color(threat_color(conjunction.threat_level)),
                        )
                        .on_press(Message::SelectConjunction(conjunction.id))
                        .width(Length::Fill),
                    )
                })
        };

        let flight = state
            .frame
            .flight_progress
            .map(|progress| format!("Camera flight {:.0}%", progress * 100.0))
            .unwrap_or_else(|| "Camera idle".into());

        let detail = state
            .frame
            .geometry
            .as_ref()
            .and_then(|geometry| geometry.detail.as_ref())
            .map(|detail| {
                format!(
                    "TCA in {} | miss {} ({}) | rel. velocity {}",
                    detail.time_to_tca_text(),
                    detail.miss_distance_text(),
                    detail.miss_components_text(),
                    detail
                        .relative_velocity_kms
                        .map(|kms| format!("{:.2} km/s", kms))
                        .unwrap_or_else(|| conjcore::contracts::PLACEHOLDER.to_string())
                )
            })
            .unwrap_or_else(|| "No conjunction selected".into());

        let scene = Canvas::new(SceneView {
            frame: state.frame.clone(),
            assets: state.assets.clone(),
        })
        .width(Length::Fill)
        .height(Length::Fixed(420.0));

        let scene_column = column![
            text("Mission scene").size(26),
            threat_line,
            scene,
            row![
                text(flight).size(12),
                button("Clear selection")
                    .on_press(Message::ClearSelection)
                    .padding(6),
            ]
            .spacing(12)
            .align_y(Alignment::Center),
            text(detail).size(12),
            text("Conjunctions").size(18),
            Container::new(scrollable(list).height(Length::Fixed(220.0))).padding(6),
        ]
        .spacing(10)
        .padding(16)
        .width(Length::Fill);

        let layout = row![form_column, scene_column]
            .spacing(20)
            .align_y(Alignment::Start)
            .padding(20);

        Container::new(layout)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn push_history(&mut self, entry: String) {
        self.history.push(entry);
        if self.history.len() > HISTORY_LIMIT {
            self.history.remove(0);
        }
    }
}

/// Protected assets plus every primary named by the current events.
fn tracked_assets(protected: &[NoradId], conjunctions: &[Conjunction]) -> Vec<NoradId> {
    let mut assets: Vec<NoradId> = protected
        .iter()
        .copied()
        .chain(conjunctions.iter().map(|conjunction| conjunction.primary.norad_id))
        .collect();
    assets.sort_unstable();
    assets.dedup();
    assets
}

fn parse_norad_ids(list: &str) -> anyhow::Result<Vec<NoradId>> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<NoradId>()
                .with_context(|| format!("invalid NORAD id '{id}'"))
        })
        .collect()
}

fn history_list(history: &[String]) -> Column<'_, Message> {
    if history.is_empty() {
        Column::new().push(text("No activity yet").size(12))
    } else {
        history
            .iter()
            .rev()
            .fold(Column::new().spacing(4), |col, entry| {
                col.push(text(entry.clone()).size(12))
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ScreeningForm {
    asset_ids: String,
    window_days: String,
    threshold_km: String,
}

#[derive(Debug, Clone, PartialEq)]
struct FormRequest {
    asset_ids: Vec<u64>,
    window_days: u32,
    distance_threshold_km: f64,
}

impl Default for ScreeningForm {
    fn default() -> Self {
        Self {
            asset_ids: String::new(),
            window_days: "7".into(),
            threshold_km: "5.0".into(),
        }
    }
}

impl ScreeningForm {
    fn update_field(&mut self, field: FormField, value: String) {
        match field {
            FormField::AssetIds => self.asset_ids = value,
            FormField::WindowDays => self.window_days = value,
            FormField::ThresholdKm => self.threshold_km = value,
        }
    }

    fn parse(&self) -> Result<FormRequest, String> {
        let asset_ids = self
            .asset_ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| id.parse::<u64>().map_err(|_| format!("invalid asset id '{id}'")))
            .collect::<Result<Vec<_>, _>>()?;
        let window_days = self
            .window_days
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|days| *days > 0)
            .ok_or_else(|| format!("invalid window '{}'", self.window_days))?;
        let distance_threshold_km = self
            .threshold_km
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|km| km.is_finite() && *km > 0.0)
            .ok_or_else(|| format!("invalid threshold '{}'", self.threshold_km))?;
        Ok(FormRequest {
            asset_ids,
            window_days,
            distance_threshold_km,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conjcore::testing::sample_conjunction;

    #[test]
    fn blank_asset_field_screens_everything() {
        let request = ScreeningForm::default().parse().unwrap();
        assert!(request.asset_ids.is_empty());
        assert_eq!(request.window_days, 7);
        assert_eq!(request.distance_threshold_km, 5.0);
    }

    #[test]
    fn asset_list_accepts_spaces_and_trailing_commas() {
        let mut form = ScreeningForm::default();
        form.update_field(FormField::AssetIds, " 1, 2 ,".into());
        assert_eq!(form.parse().unwrap().asset_ids, vec![1, 2]);
    }

    #[test]
    fn bad_numbers_are_reported() {
        let mut form = ScreeningForm::default();
        form.update_field(FormField::AssetIds, "1,x".into());
        assert_eq!(form.parse().unwrap_err(), "invalid asset id 'x'");

        let mut form = ScreeningForm::default();
        form.update_field(FormField::WindowDays, "0".into());
        assert!(form.parse().unwrap_err().starts_with("invalid window"));

        let mut form = ScreeningForm::default();
        form.update_field(FormField::ThresholdKm, "-2".into());
        assert!(form.parse().unwrap_err().starts_with("invalid threshold"));
    }

    #[test]
    fn protected_assets_are_tracked_without_events() {
        assert_eq!(tracked_assets(&[43013, 25544], &[]), vec![25544, 43013]);

        let conjunctions = vec![
            sample_conjunction(1, 25544, 48078, ThreatLevel::High),
            sample_conjunction(2, 20580, 22675, ThreatLevel::Low),
        ];
        assert_eq!(
            tracked_assets(&[25544], &conjunctions),
            vec![20580, 25544]
        );
    }

    #[test]
    fn protected_asset_list_parses_norad_ids() {
        assert_eq!(parse_norad_ids("25544, 43013,").unwrap(), vec![25544, 43013]);
        assert!(parse_norad_ids("").unwrap().is_empty());
        assert!(parse_norad_ids("25544,ISS").is_err());
    }
}
