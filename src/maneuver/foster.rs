use super::{BodyPose, Difficulty, Indication, Maneuver, epley::direction, step, tr};
use crate::types::{CanalType, Language, Side};

/// Kneeling on the bed, sitting back on the heels.
const KNEELING: BodyPose = BodyPose {
    leg_angle: 0.0,
    knee_angle: 150.0,
    y_offset: -0.9,
    ..BodyPose::SEATED
};

pub(super) fn build(lang: Language, side: Side, precautions: &[String]) -> Maneuver {
    let s = side.yaw_sign();
    let (ear_en, ear_zh) = (direction(side, Language::En), direction(side, Language::Zh));
    let id = match side {
        Side::Left => "foster_left",
        Side::Right => "foster_right",
    };

    let steps = vec![
        step(
            lang,
            ("Step 1: Kneel & Look Up", "步骤 1: 跪坐仰头"),
            (
                "Kneel and sit back on your heels. Tip your head back and look at the ceiling for a few seconds.",
                "跪在床上，臀部坐在脚跟上。头向后仰，看向天花板，保持数秒。",
            ),
            15,
            BodyPose {
                head_pitch: -30.0,
                ..KNEELING
            },
            (0.0, 0.1),
        ),
        step(
            lang,
            ("Step 2: Head Down", "步骤 2: 低头触床"),
            (
                "Place your hands on the bed in front of you and tuck your chin, bringing the top of your head down toward your knees. Wait until any dizziness stops.",
                "双手撑在身前床面，下巴内收，将头顶向下贴近膝盖。等待眩晕消失。",
            ),
            30,
            BodyPose {
                torso_angle: 170.0,
                head_pitch: 30.0,
                arm_angle: 60.0,
                ..KNEELING
            },
            (0.1, 0.35),
        ),
        step(
            lang,
            (
                &format!("Step 3: Face Your {} Elbow", super::epley::title_case(ear_en)),
                &format!("步骤 3: 转向{}肘", ear_zh.trim_matches(['【', '】'])),
            ),
            (
                &format!(
                    "Keeping your head down, turn it about 45 degrees toward your {ear_en} elbow so you are looking at it."
                ),
                &format!("保持低头姿势，将头向{ear_zh}转约 45 度，看向该侧肘部。"),
            ),
            30,
            BodyPose {
                torso_angle: 170.0,
                head_yaw: 45.0 * s,
                head_pitch: 30.0,
                arm_angle: 60.0,
                ..KNEELING
            },
            (0.35, 0.6),
        ),
        step(
            lang,
            ("Step 4: Raise Head to Back Level", "步骤 4: 抬头与背平齐"),
            (
                "Keep your head turned and quickly raise it until it is level with your back, as if on all fours.",
                "保持头部转向，迅速将头抬起至与背部平齐，呈四肢着地姿势。",
            ),
            30,
            BodyPose {
                torso_angle: 135.0,
                head_yaw: 45.0 * s,
                head_pitch: 0.0,
                arm_angle: 60.0,
                ..KNEELING
            },
            (0.6, 0.8),
        ),
        step(
            lang,
            ("Step 5: Sit Up", "步骤 5: 直起上身"),
            (
                "Keeping your head turned, quickly sit back up on your heels.",
                "保持头部转向，迅速直起上身坐回脚跟上。",
            ),
            15,
            BodyPose {
                head_yaw: 45.0 * s,
                ..KNEELING
            },
            (0.8, 0.95),
        ),
        step(
            lang,
            ("Step 6: Face Forward", "步骤 6: 回正头部"),
            (
                "Slowly turn your head back to face forward and rest.",
                "缓慢将头转回正前方，休息片刻。",
            ),
            15,
            KNEELING,
            (0.95, 1.0),
        ),
    ];

    Maneuver {
        id,
        name: tr(
            lang,
            &format!("Foster Half-Somersault ({} Ear)", super::epley::title_case(ear_en)),
            &format!("Foster 半翻筋斗法 ({}耳)", ear_zh.trim_matches(['【', '】'])),
        ),
        description: tr(
            lang,
            "A kneeling maneuver that can be done without assistance, used here for anterior canal BPPV.",
            "无需他人协助的跪姿复位方法，此处用于前半规管耳石症。",
        ),
        difficulty: Difficulty::Easy,
        precautions: precautions.to_vec(),
        recommended_for: Indication {
            canal: CanalType::Anterior,
            side: Some(side),
        },
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foster_folds_forward_and_turns_toward_ear() {
        let maneuver = build(Language::En, Side::Right, &[]);
        assert_eq!(maneuver.steps.len(), 6);
        assert!(maneuver.steps[1].pose.torso_angle > 90.0);
        assert_eq!(maneuver.steps[2].pose.head_yaw, -45.0);
        assert_eq!(maneuver.steps[2].title, "Step 3: Face Your Right Elbow");
        assert!(maneuver.steps.iter().all(|step| step.pose.y_offset < 0.0));
    }
}
