pub mod otolith;
pub mod scene;

use std::time::Duration;

use crate::{config::RenderConfig, maneuver::BodyPose};

pub use scene::SceneGraph;

/// Body yaw beyond which the figure slides toward the bed edge it faces.
const EDGE_YAW: f32 = 45.0;

/// Wraps an angle in degrees into (-180, 180].
pub fn normalize_degrees(angle: f32) -> f32 {
    let wrapped = (angle + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 { wrapped + 360.0 } else { wrapped }
}

fn approach(current: f32, target: f32, factor: f32) -> f32 {
    current + (target - current) * factor
}

fn approach_wrapped(current: f32, target: f32, factor: f32) -> f32 {
    let current = normalize_degrees(current);
    let delta = normalize_degrees(target - current);
    current + delta * factor
}

/// Eases a displayed pose toward the active step's target pose.
#[derive(Clone, Debug)]
pub struct PostureAnimator {
    current: BodyPose,
    target: BodyPose,
    lateral_offset: f32,
    damping: f32,
    side_offset: f32,
}

impl PostureAnimator {
    pub fn new(config: &RenderConfig, initial: BodyPose) -> Self {
        Self {
            current: initial,
            target: initial,
            lateral_offset: lateral_target(initial.body_yaw, config.side_offset),
            damping: config.damping,
            side_offset: config.side_offset,
        }
    }

    pub fn set_target(&mut self, target: BodyPose) {
        self.target = target;
    }

    pub fn target(&self) -> &BodyPose {
        &self.target
    }

    pub fn current(&self) -> &BodyPose {
        &self.current
    }

    pub fn lateral_offset(&self) -> f32 {
        self.lateral_offset
    }

    /// Advances the animation by `dt`.
    pub fn tick(&mut self, dt: Duration) {
        let factor = 1.0 - (-self.damping * dt.as_secs_f32()).exp();
        let (cur, tgt) = (&mut self.current, &self.target);

        cur.torso_angle = approach(cur.torso_angle, tgt.torso_angle, factor);
        cur.body_roll = approach_wrapped(cur.body_roll, tgt.body_roll, factor);
        cur.body_yaw = approach_wrapped(cur.body_yaw, tgt.body_yaw, factor);
        cur.head_yaw = approach(cur.head_yaw, tgt.head_yaw, factor);
        cur.head_pitch = approach(cur.head_pitch, tgt.head_pitch, factor);
        cur.leg_angle = approach(cur.leg_angle, tgt.leg_angle, factor);
        cur.knee_angle = approach(cur.knee_angle, tgt.knee_angle, factor);
        cur.arm_angle = approach(cur.arm_angle, tgt.arm_angle, factor);
        cur.elbow_angle = approach(cur.elbow_angle, tgt.elbow_angle, factor);
        cur.y_offset = approach(cur.y_offset, tgt.y_offset, factor);

        let lateral = lateral_target(tgt.body_yaw, self.side_offset);
        self.lateral_offset = approach(self.lateral_offset, lateral, factor);
    }

    /// True once every joint is within `tolerance` degrees of its target.
    pub fn is_settled(&self, tolerance: f32) -> bool {
        let (cur, tgt) = (&self.current, &self.target);
        let linear = [
            (cur.torso_angle, tgt.torso_angle),
            (cur.head_yaw, tgt.head_yaw),
            (cur.head_pitch, tgt.head_pitch),
            (cur.leg_angle, tgt.leg_angle),
            (cur.knee_angle, tgt.knee_angle),
            (cur.arm_angle, tgt.arm_angle),
            (cur.elbow_angle, tgt.elbow_angle),
        ];
        linear.iter().all(|(c, t)| (c - t).abs() <= tolerance)
            && normalize_degrees(tgt.body_roll - cur.body_roll).abs() <= tolerance
            && normalize_degrees(tgt.body_yaw - cur.body_yaw).abs() <= tolerance
    }

    pub fn scene(&self) -> SceneGraph {
        SceneGraph::from_pose(&self.current, self.lateral_offset)
    }
}

fn lateral_target(body_yaw: f32, side_offset: f32) -> f32 {
    let yaw = normalize_degrees(body_yaw);
    if yaw > EDGE_YAW {
        side_offset
    } else if yaw < -EDGE_YAW {
        -side_offset
    } else {
        0.0
    }
}
