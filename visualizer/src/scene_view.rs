use conjcore::contracts::{NoradId, ThreatLevel};
use conjcore::math::ScenePosition;
use conjcore::scene::{CameraPose, FrameState, OrbitTrail, Projected};
use iced::{
    mouse,
    widget::canvas::{self, Frame, Geometry, Path, Stroke},
    Color, Point, Rectangle, Renderer, Theme,
};

/// Fraction of the shorter canvas side used as the projection focal length.
const FOCAL_FACTOR: f64 = 0.9;
const LIMB_SEGMENTS: usize = 96;
const TCA_DASH: f64 = 0.02;
const TCA_GAP: f64 = 0.015;
const MARKER_RADIUS: f32 = 4.0;

pub fn threat_color(level: ThreatLevel) -> Color {
    match level {
        ThreatLevel::Critical => Color::from_rgb(0.95, 0.2, 0.2),
        ThreatLevel::High => Color::from_rgb(0.97, 0.55, 0.15),
        ThreatLevel::Moderate => Color::from_rgb(0.95, 0.85, 0.25),
        ThreatLevel::Low => Color::from_rgb(0.45, 0.75, 0.45),
    }
}

/// Points on the visible edge of the unit Earth as seen from `camera`; empty when
/// the camera sits inside the sphere.
pub fn limb_points(camera: &CameraPose, segments: usize) -> Vec<ScenePosition> {
    let distance = camera.position.norm();
    if distance <= 1.0 || segments == 0 {
        return Vec::new();
    }
    let axis = camera.position / distance;
    let center = axis / distance;
    let radius = (1.0 - 1.0 / (distance * distance)).sqrt();
    let helper = if axis.y.abs() < 0.9 {
        ScenePosition::y()
    } else {
        ScenePosition::x()
    };
    let u = axis.cross(&helper).normalize();
    let v = axis.cross(&u);
    (0..segments)
        .map(|index| {
            let angle = std::f64::consts::TAU * index as f64 / segments as f64;
            center + (u * angle.cos() + v * angle.sin()) * radius
        })
        .collect()
}

/// One rendered frame of the mission scene.
#[derive(Debug, Clone)]
pub struct SceneView {
    pub frame: FrameState,
    pub assets: Vec<(NoradId, ScenePosition)>,
}

struct Viewport {
    center: Point,
    focal: f64,
}

impl Viewport {
    fn new(bounds: Rectangle) -> Self {
        Self {
            center: Point::new(bounds.width / 2.0, bounds.height / 2.0),
            focal: f64::from(bounds.width.min(bounds.height)) * FOCAL_FACTOR,
        }
    }

    fn to_screen(&self, projected: Projected) -> Point {
        Point::new(
            self.center.x + projected.x as f32,
            self.center.y - projected.y as f32,
        )
    }
}

impl SceneView {
    fn visible(&self, viewport: &Viewport, point: &ScenePosition) -> Option<Point> {
        let camera = &self.frame.camera;
        if camera.occluded_by_earth(point) {
            return None;
        }
        camera
            .project(point, viewport.focal)
            .map(|projected| viewport.to_screen(projected))
    }

    fn draw_earth(&self, frame: &mut Frame, viewport: &Viewport) {
        let outline: Vec<Point> = limb_points(&self.frame.camera, LIMB_SEGMENTS)
            .iter()
            .filter_map(|point| self.frame.camera.project(point, viewport.focal))
            .map(|projected| viewport.to_screen(projected))
            .collect();
        if outline.len() < 3 {
            return;
        }
        let disc = Path::new(|builder| {
            builder.move_to(outline[0]);
            for point in &outline[1..] {
                builder.line_to(*point);
            }
            builder.close();
        });
        frame.fill(&disc, Color::from_rgb(0.06, 0.12, 0.24));
        frame.stroke(
            &disc,
            Stroke::default()
                .with_width(1.5)
                .with_color(Color::from_rgb(0.3, 0.5, 0.8)),
        );
    }

    /// Polyline that breaks wherever the trail passes behind the Earth.
    fn draw_trail(&self, frame: &mut Frame, viewport: &Viewport, trail: &OrbitTrail, color: Color) {
        let path = Path::new(|builder| {
            let mut pen_down = false;
            for point in &trail.points {
                match self.visible(viewport, point) {
                    Some(screen) if pen_down => builder.line_to(screen),
                    Some(screen) => {
                        builder.move_to(screen);
                        pen_down = true;
                    }
                    None => pen_down = false,
                }
            }
        });
        frame.stroke(&path, Stroke::default().with_width(1.5).with_color(color));
    }

    fn draw_marker(&self, frame: &mut Frame, viewport: &Viewport, point: &ScenePosition, radius: f32, color: Color) {
        if let Some(screen) = self.visible(viewport, point) {
            let marker = Path::new(|builder| builder.circle(screen, radius));
            frame.fill(&marker, color);
        }
    }
}

impl canvas::Program<crate::Message> for SceneView {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        frame.fill_rectangle(
            Point::ORIGIN,
            bounds.size(),
            Color::from_rgb(0.01, 0.01, 0.03),
        );
        let viewport = Viewport::new(bounds);
        self.draw_earth(&mut frame, &viewport);

        for threat in &self.frame.threats {
            self.draw_marker(
                &mut frame,
                &viewport,
                &threat.position,
                MARKER_RADIUS * 0.75,
                threat_color(threat.threat_level),
            );
        }

        for (_, position) in &self.assets {
            self.draw_marker(
                &mut frame,
                &viewport,
                position,
                MARKER_RADIUS,
                Color::from_rgb(0.3, 0.9, 0.95),
            );
        }

        if let Some(geometry) = &self.frame.geometry {
            if let Some(trail) = &geometry.primary {
                self.draw_trail(&mut frame, &viewport, trail, Color::from_rgb(0.18, 0.72, 0.89));
            }
            if let Some(trail) = &geometry.secondary {
                self.draw_trail(&mut frame, &viewport, trail, Color::from_rgb(0.95, 0.55, 0.2));
            }
            if let Some(tca) = &geometry.tca {
                let dashes = Path::new(|builder| {
                    for (from, to) in tca.dashed(TCA_DASH, TCA_GAP) {
                        if let (Some(a), Some(b)) = (
                            self.visible(&viewport, &from),
                            self.visible(&viewport, &to),
                        ) {
                            builder.move_to(a);
                            builder.line_to(b);
                        }
                    }
                });
                frame.stroke(
                    &dashes,
                    Stroke::default()
                        .with_width(1.5)
                        .with_color(Color::from_rgb(0.95, 0.25, 0.25)),
                );
                self.draw_marker(
                    &mut frame,
                    &viewport,
                    &tca.primary,
                    MARKER_RADIUS,
                    Color::from_rgb(0.18, 0.72, 0.89),
                );
                self.draw_marker(
                    &mut frame,
                    &viewport,
                    &tca.secondary,
                    MARKER_RADIUS * self.frame.pulse_scale as f32,
                    Color::from_rgb(0.95, 0.25, 0.25),
                );
            }
        }

        vec![frame.into_geometry()]
    }
}
