use super::{BodyPose, Difficulty, Indication, Maneuver, epley::direction, epley::title_case, step, tr};
use crate::types::{CanalType, Language, Side};

fn supine(body_roll: f32, head_yaw: f32) -> BodyPose {
    BodyPose {
        torso_angle: 0.0,
        body_roll,
        head_yaw,
        ..BodyPose::default()
    }
}

/// Roll toward the healthy ear in quarter turns, starting from the head turned
/// to the affected ear.
pub(super) fn build(lang: Language, side: Side, precautions: &[String]) -> Maneuver {
    let s = side.yaw_sign();
    // Body roll is positive toward the right, head yaw positive toward the left.
    let healthy_roll = s * 90.0;
    let (ear_en, ear_zh) = (direction(side, Language::En), direction(side, Language::Zh));
    let (other_en, other_zh) = (
        direction(side.opposite(), Language::En),
        direction(side.opposite(), Language::Zh),
    );
    let id = match side {
        Side::Left => "bbq_left",
        Side::Right => "bbq_right",
    };

    let steps = vec![
        step(
            lang,
            ("Step 1: Lie Back, Head Turned", "步骤 1: 仰卧转头"),
            (
                &format!("Lie flat on your back and turn your head 90 degrees to the {ear_en}."),
                &format!("平躺，头部向{ear_zh}转 90 度。"),
            ),
            30,
            supine(0.0, 90.0 * s),
            (0.0, 0.1),
        ),
        step(
            lang,
            ("Step 2: Face the Ceiling", "步骤 2: 面向天花板"),
            (
                "Turn your head back to face straight up.",
                "将头转回正中，面向天花板。",
            ),
            30,
            supine(0.0, 0.0),
            (0.1, 0.25),
        ),
        step(
            lang,
            (
                &format!("Step 3: Roll {}", title_case(other_en)),
                &format!("步骤 3: 向{}翻身", other_zh.trim_matches(['【', '】'])),
            ),
            (
                &format!("Roll your whole body a quarter turn {other_en} so you lie on your {other_en} side."),
                &format!("整个身体向{other_zh}翻转 90 度，变为侧卧。"),
            ),
            30,
            supine(healthy_roll, 0.0),
            (0.25, 0.45),
        ),
        step(
            lang,
            ("Step 4: Roll Face Down", "步骤 4: 翻至俯卧"),
            (
                "Keep rolling in the same direction until you lie face down, propped on your elbows.",
                "继续沿同一方向翻身至俯卧，用肘部支撑。",
            ),
            30,
            BodyPose {
                elbow_angle: 90.0,
                arm_angle: 90.0,
                ..supine(2.0 * healthy_roll, 0.0)
            },
            (0.45, 0.65),
        ),
        step(
            lang,
            (
                &format!("Step 5: Roll Onto {} Side", title_case(ear_en)),
                &format!("步骤 5: 翻至{}侧卧", ear_zh.trim_matches(['【', '】'])),
            ),
            (
                &format!("Continue the roll one more quarter turn so you lie on your {ear_en} side."),
                &format!("继续同方向翻转 90 度，变为{ear_zh}侧卧。"),
            ),
            30,
            supine(3.0 * healthy_roll, 0.0),
            (0.65, 0.85),
        ),
        step(
            lang,
            ("Step 6: Sit Up", "步骤 6: 坐起"),
            (
                "Roll onto your back and slowly sit up. Rest before standing.",
                "翻回仰卧后缓慢坐起，休息后再站立。",
            ),
            30,
            BodyPose::SEATED,
            (0.85, 1.0),
        ),
    ];

    Maneuver {
        id,
        name: tr(
            lang,
            &format!("BBQ Roll ({} Ear)", title_case(ear_en)),
            &format!("BBQ 翻滚复位法 ({}耳)", ear_zh.trim_matches(['【', '】'])),
        ),
        description: tr(
            lang,
            "A series of quarter-turn rolls for horizontal canal BPPV.",
            "治疗水平半规管耳石症的分段翻滚复位方法。",
        ),
        difficulty: Difficulty::Advanced,
        precautions: precautions.to_vec(),
        recommended_for: Indication {
            canal: CanalType::Horizontal,
            side: Some(side),
        },
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_right_ear_rolls_toward_left() {
        let maneuver = build(Language::En, Side::Right, &[]);
        let rolls: Vec<f32> = maneuver.steps.iter().map(|s| s.pose.body_roll).collect();
        assert_eq!(rolls, vec![0.0, 0.0, -90.0, -180.0, -270.0, 0.0]);
        assert_eq!(maneuver.steps[0].pose.head_yaw, -90.0);
        assert_eq!(maneuver.steps[2].title, "Step 3: Roll Left");
    }
}
