use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};

use crate::maneuver::BodyPose;

const HEAD_PIVOT: [f32; 3] = [0.0, 1.2, 0.0];
const SHOULDER_X: f32 = 0.7;
const SHOULDER_Y: f32 = 0.9;
const UPPER_ARM: f32 = 0.5;
const HIP_X: f32 = 0.25;
const HIP_Y: f32 = -0.4;
const THIGH: f32 = 1.0;

fn rot_x(degrees: f32) -> UnitQuaternion<f32> {
    UnitQuaternion::from_axis_angle(&Vector3::x_axis(), degrees.to_radians())
}

fn rot_y(degrees: f32) -> UnitQuaternion<f32> {
    UnitQuaternion::from_axis_angle(&Vector3::y_axis(), degrees.to_radians())
}

fn joint(x: f32, y: f32, z: f32, rotation: UnitQuaternion<f32>) -> Isometry3<f32> {
    Isometry3::from_parts(Translation3::new(x, y, z), rotation)
}

/// A two-segment limb: the proximal joint and the one it carries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Limb {
    pub upper: Isometry3<f32>,
    pub lower: Isometry3<f32>,
}

/// World transforms of every animated segment for one pose.
///
/// The body root nests as: position, then body yaw about world Y, then
/// posture pitch about the local X axis (`torso_angle - 90`), then spine roll
/// about the local Y axis. Rolling therefore always turns the body about its
/// own spine, whether sitting or lying. The head hangs off the root at the
/// neck pivot: yaw about the neck first, then pitch about the turned head's
/// own X axis, so extension stays extension whatever the head yaw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneGraph {
    pub root: Isometry3<f32>,
    pub head: Isometry3<f32>,
    pub left_arm: Limb,
    pub right_arm: Limb,
    pub left_leg: Limb,
    pub right_leg: Limb,
}

impl SceneGraph {
    pub fn from_pose(pose: &BodyPose, lateral_offset: f32) -> Self {
        let position = Translation3::new(lateral_offset, pose.y_offset, 0.0);
        let orientation = rot_y(-pose.body_yaw) * rot_x(pose.torso_angle - 90.0) * rot_y(-pose.body_roll);
        let root = Isometry3::from_parts(position, orientation);

        let [hx, hy, hz] = HEAD_PIVOT;
        let head = root * joint(hx, hy, hz, rot_y(pose.head_yaw) * rot_x(pose.head_pitch));

        let arm = |x: f32| {
            let upper = root * joint(x, SHOULDER_Y, 0.0, rot_x(-pose.arm_angle));
            let lower = upper * joint(0.0, -UPPER_ARM, 0.0, rot_x(-pose.elbow_angle));
            Limb { upper, lower }
        };
        let leg = |x: f32| {
            let upper = root * joint(x, HIP_Y, 0.0, rot_x(-pose.leg_angle));
            let lower = upper * joint(0.0, -THIGH, 0.0, rot_x(pose.knee_angle));
            Limb { upper, lower }
        };

        Self {
            root,
            head,
            left_arm: arm(-SHOULDER_X),
            right_arm: arm(SHOULDER_X),
            left_leg: leg(-HIP_X),
            right_leg: leg(HIP_X),
        }
    }

    /// Direction of the spine (pelvis toward head) in world space.
    pub fn spine_axis(&self) -> Vector3<f32> {
        self.root.rotation * Vector3::y()
    }

    /// Direction the face points in world space.
    pub fn facing(&self) -> Vector3<f32> {
        self.head.rotation * Vector3::z()
    }

    pub fn head_position(&self) -> Point3<f32> {
        self.head * Point3::origin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vector3<f32>, b: Vector3<f32>) -> bool {
        (a - b).norm() < 1e-4
    }

    #[test]
    fn test_seated_spine_is_vertical() {
        let scene = SceneGraph::from_pose(&BodyPose::SEATED, 0.0);
        assert!(close(scene.spine_axis(), Vector3::y()));
        assert!(close(scene.facing(), Vector3::z()));
        assert!((scene.head_position() - Point3::new(0.0, 1.2, 0.0)).norm() < 1e-4);
    }

    #[test]
    fn test_supine_faces_ceiling() {
        let scene = SceneGraph::from_pose(&BodyPose::default(), 0.0);
        assert!(close(scene.spine_axis(), -Vector3::z()));
        assert!(close(scene.facing(), Vector3::y()));
    }

    #[test]
    fn test_roll_turns_about_spine_when_lying() {
        let pose = BodyPose {
            body_roll: 90.0,
            ..BodyPose::default()
        };
        let scene = SceneGraph::from_pose(&pose, 0.0);
        // Spine unchanged by roll; face now horizontal.
        assert!(close(scene.spine_axis(), -Vector3::z()));
        assert!(scene.facing().y.abs() < 1e-4);
        assert!((scene.facing().x.abs() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_sideways_sit_keeps_spine_vertical() {
        let pose = BodyPose {
            body_yaw: 90.0,
            leg_angle: 85.0,
            ..BodyPose::SEATED
        };
        let scene = SceneGraph::from_pose(&pose, 0.85);
        assert!(close(scene.spine_axis(), Vector3::y()));
        assert!(scene.facing().z.abs() < 1e-4);
        assert!((scene.root.translation.vector.x - 0.85).abs() < 1e-6);
    }

    #[test]
    fn test_head_extends_after_turning() {
        let pose = BodyPose {
            head_yaw: 90.0,
            head_pitch: -30.0,
            ..BodyPose::SEATED
        };
        let facing = SceneGraph::from_pose(&pose, 0.0).facing();
        assert!((facing.x - 30f32.to_radians().cos()).abs() < 1e-4);
        assert!((facing.y - 0.5).abs() < 1e-4);
        assert!(facing.z.abs() < 1e-4);
    }

    #[test]
    fn test_limbs_hang_from_their_pivots() {
        let scene = SceneGraph::from_pose(&BodyPose::SEATED, 0.0);
        let elbow = scene.left_arm.lower * Point3::origin();
        assert!((elbow - Point3::new(-0.7, 0.4, 0.0)).norm() < 1e-4);
        let knee = scene.right_leg.lower * Point3::origin();
        assert!((knee - Point3::new(0.25, -1.4, 0.0)).norm() < 1e-4);
    }
}
