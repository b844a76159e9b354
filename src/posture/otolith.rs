use nalgebra::{Point3, UnitQuaternion, Vector3};

use super::scene::SceneGraph;
use crate::{
    maneuver::{BodyPose, ManeuverStep},
    types::CanalType,
};

/// Canal centre lines relative to the utricle at the origin, listed from the
/// common crus around the loop.
const POSTERIOR: &[[f32; 3]] = &[
    [0.1, 0.2, 0.0],
    [0.6, 0.8, -0.5],
    [1.2, 0.0, -0.8],
    [0.6, -1.0, -0.4],
    [0.1, -0.4, 0.0],
    [0.0, 0.0, 0.0],
];

const ANTERIOR: &[[f32; 3]] = &[
    [0.1, 0.2, 0.0],
    [0.5, 1.2, 0.4],
    [0.8, 0.5, 0.8],
    [0.2, 0.0, 0.4],
    [0.0, 0.0, 0.0],
];

const HORIZONTAL: &[[f32; 3]] = &[
    [0.0, 0.0, 0.0],
    [0.5, 0.0, 0.5],
    [1.2, 0.0, 0.0],
    [0.6, 0.0, -0.6],
    [0.1, -0.1, -0.1],
];

/// Closed path the crystals follow during repositioning, ampulla first.
#[derive(Clone, Debug)]
pub struct CanalPath {
    points: Vec<Point3<f32>>,
    /// Cumulative length at each point, closing segment included.
    cumulative: Vec<f32>,
}

impl CanalPath {
    pub fn for_canal(canal: CanalType) -> Self {
        let outline = match canal {
            CanalType::Posterior => POSTERIOR,
            CanalType::Anterior => ANTERIOR,
            CanalType::Horizontal => HORIZONTAL,
        };
        // Repositioning moves debris from the ampulla toward the crus, the
        // reverse of the outline order.
        let points: Vec<Point3<f32>> = outline
            .iter()
            .rev()
            .map(|&[x, y, z]| Point3::new(x, y, z))
            .collect();

        let mut cumulative = Vec::with_capacity(points.len() + 1);
        let mut total = 0.0;
        cumulative.push(total);
        for idx in 0..points.len() {
            let next = points[(idx + 1) % points.len()];
            total += (next - points[idx]).norm();
            cumulative.push(total);
        }

        Self { points, cumulative }
    }

    pub fn length(&self) -> f32 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Point at fraction `t` of the loop; `t` wraps.
    pub fn point_at(&self, t: f32) -> Point3<f32> {
        let total = self.length();
        if total <= f32::EPSILON {
            return self.points.first().copied().unwrap_or_else(Point3::origin);
        }

        let distance = t.rem_euclid(1.0) * total;
        let segment = self
            .cumulative
            .partition_point(|&d| d <= distance)
            .saturating_sub(1)
            .min(self.points.len() - 1);
        let start = self.points[segment];
        let end = self.points[(segment + 1) % self.points.len()];
        let seg_len = self.cumulative[segment + 1] - self.cumulative[segment];
        let local = if seg_len > 0.0 {
            (distance - self.cumulative[segment]) / seg_len
        } else {
            0.0
        };
        start + (end - start) * local
    }
}

/// Progress of the crystal clump `elapsed_fraction` of the way through `step`.
pub fn stone_progress(step: &ManeuverStep, elapsed_fraction: f32) -> f32 {
    let (start, end) = step.progress;
    start + (end - start) * elapsed_fraction.clamp(0.0, 1.0)
}

/// Orientation of the labyrinth for a pose. The inner ear moves with the
/// head, so this is the scene graph's head rotation.
pub fn labyrinth_orientation(pose: &BodyPose) -> UnitQuaternion<f32> {
    SceneGraph::from_pose(pose, 0.0).head.rotation
}

/// World gravity expressed in the labyrinth's own frame.
pub fn gravity_in_labyrinth(pose: &BodyPose) -> Vector3<f32> {
    labyrinth_orientation(pose).inverse() * Vector3::new(0.0, -1.0, 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{maneuver::Catalog, maneuver::Protocol, types::{Language, Side}};

    #[test]
    fn test_path_starts_at_ampulla_end() {
        let path = CanalPath::for_canal(CanalType::Posterior);
        assert_eq!(path.point_at(0.0), Point3::origin());
        assert!((path.point_at(1.0) - path.point_at(0.0)).norm() < 1e-5);
        assert!(path.length() > 0.0);
    }

    #[test]
    fn test_point_at_interpolates_along_segments() {
        let path = CanalPath::for_canal(CanalType::Horizontal);
        let quarter = path.point_at(0.25);
        let half = path.point_at(0.5);
        assert!((quarter - half).norm() > 0.1);
        for t in [0.1, 0.33, 0.9, 0.999] {
            let p = path.point_at(t);
            assert!(p.x.is_finite() && p.y.is_finite() && p.z.is_finite());
        }
    }

    #[test]
    fn test_stone_progress_stays_inside_step_interval() {
        let catalog = Catalog::new(Language::En);
        let maneuver = catalog.lookup(Protocol::Epley, Side::Right).unwrap();
        let step = &maneuver.steps[1];
        assert_eq!(stone_progress(step, 0.0), 0.05);
        assert!((stone_progress(step, 0.5) - 0.2).abs() < 1e-6);
        assert!((stone_progress(step, 2.0) - 0.35).abs() < 1e-6);
    }

    #[test]
    fn test_labyrinth_follows_rendered_head() {
        let catalog = Catalog::new(Language::En);
        let maneuver = catalog.lookup(Protocol::Epley, Side::Right).unwrap();
        for step in &maneuver.steps {
            let head = SceneGraph::from_pose(&step.pose, 0.7).head.rotation;
            assert!(head.angle_to(&labyrinth_orientation(&step.pose)) < 1e-4);
        }

        // Turned 45° and extended while supine.
        let pose = BodyPose {
            head_yaw: -45.0,
            head_pitch: -30.0,
            ..BodyPose::default()
        };
        let gravity = gravity_in_labyrinth(&pose);
        let head = SceneGraph::from_pose(&pose, 0.0).head.rotation;
        let expected = head.inverse() * Vector3::new(0.0, -1.0, 0.0);
        assert!((gravity - expected).norm() < 1e-5);
    }

    #[test]
    fn test_gravity_when_seated_points_down() {
        let gravity = gravity_in_labyrinth(&BodyPose::SEATED);
        assert!((gravity - Vector3::new(0.0, -1.0, 0.0)).norm() < 1e-5);

        let supine = gravity_in_labyrinth(&BodyPose::default());
        assert!(supine.y.abs() < 1e-5);
        assert!((supine.norm() - 1.0).abs() < 1e-5);
    }
}
