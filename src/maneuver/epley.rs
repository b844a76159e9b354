use super::{BodyPose, Difficulty, Indication, Maneuver, step, tr};
use crate::types::{CanalType, Language, Side};

pub(super) fn direction(side: Side, lang: Language) -> &'static str {
    match (side, lang) {
        (Side::Left, Language::En) => "LEFT",
        (Side::Right, Language::En) => "RIGHT",
        (Side::Left, Language::Zh) => "【左】",
        (Side::Right, Language::Zh) => "【右】",
    }
}

pub(super) fn build(lang: Language, side: Side, precautions: &[String]) -> Maneuver {
    let s = side.yaw_sign();
    let (ear_en, ear_zh) = (direction(side, Language::En), direction(side, Language::Zh));
    let (other_en, other_zh) = (
        direction(side.opposite(), Language::En),
        direction(side.opposite(), Language::Zh),
    );
    let id = match side {
        Side::Left => "epley_left",
        Side::Right => "epley_right",
    };

    let steps = vec![
        step(
            lang,
            ("Step 1: Sit & Turn", "步骤 1: 端坐转头"),
            (
                &format!(
                    "Sit on the bed with legs extended. Turn your head 45 degrees to the {ear_en}. This aligns the posterior canal."
                ),
                &format!("坐在床边，双腿伸直。头部向{ear_zh}转 45 度。此举是为了让后半规管与身体纵轴平行。"),
            ),
            15,
            BodyPose {
                head_yaw: 45.0 * s,
                ..BodyPose::SEATED
            },
            (0.0, 0.05),
        ),
        step(
            lang,
            ("Step 2: Lie Back (Head Hanging)", "步骤 2: 快速仰卧 (悬头位)"),
            (
                "Quickly lie back keeping your head turned. Let the head hang extended 30 degrees over the edge or pillow. The crystals move away from the ampulla.",
                "保持头部转向，快速向后躺下。务必让头部悬空或枕在肩下，使头后仰约 30 度。这是最关键的一步，耳石开始从壶腹滑出。",
            ),
            60,
            BodyPose {
                head_yaw: 45.0 * s,
                head_pitch: -30.0,
                ..BodyPose::default()
            },
            (0.05, 0.35),
        ),
        step(
            lang,
            (
                &format!("Step 3: Turn Head {}", title_case(other_en)),
                &format!("步骤 3: 向{}转头", other_zh.trim_matches(['【', '】'])),
            ),
            (
                &format!(
                    "Without moving your body, turn your head 90 degrees to the {other_en}. You are now looking 45 degrees {other_en}. The crystals travel along the canal arc."
                ),
                &format!("身体不要动，缓慢将头向{other_zh}转 90 度。此时头应向另一侧偏 45 度。耳石继续沿着管壁滑动。"),
            ),
            60,
            BodyPose {
                head_yaw: -45.0 * s,
                head_pitch: -20.0,
                ..BodyPose::default()
            },
            (0.35, 0.65),
        ),
        step(
            lang,
            (
                &format!("Step 4: Roll Body {}", title_case(other_en)),
                &format!("步骤 4: 身体{}转 (侧卧)", other_zh.trim_matches(['【', '】'])),
            ),
            (
                &format!(
                    "Roll your body 90 degrees {other_en} onto your shoulder. The head turns with the body; tuck your chin and look at the floor. The crystals enter the common crus."
                ),
                &format!("身体向{other_zh}转 90 度侧卧。头部跟随身体转动，下巴收紧贴向肩膀，视线看向地面。耳石进入总脚。"),
            ),
            60,
            BodyPose {
                body_roll: 90.0 * s,
                head_yaw: -45.0 * s,
                head_pitch: 15.0,
                ..BodyPose::default()
            },
            (0.65, 0.85),
        ),
        step(
            lang,
            ("Step 5: Drop Legs & Side Sit Up", "步骤 5: 垂腿侧身坐起"),
            (
                "Keep your chin tucked. Swing your legs off the side of the bed and push up with your arms to sit on the edge of the bed.",
                "保持下巴内收。将双腿移出床沿自然下垂。用手臂支撑，侧身坐起，最终坐在床边。",
            ),
            60,
            BodyPose {
                body_yaw: -90.0 * s,
                head_pitch: 20.0,
                leg_angle: 85.0,
                ..BodyPose::SEATED
            },
            (0.85, 1.0),
        ),
    ];

    Maneuver {
        id,
        name: tr(
            lang,
            &format!("Epley Maneuver ({} Ear)", title_case(ear_en)),
            &format!("Epley 复位法 ({}耳)", ear_zh.trim_matches(['【', '】'])),
        ),
        description: tr(
            lang,
            &format!(
                "The standard maneuver for treating {} posterior canal BPPV.",
                ear_en.to_ascii_lowercase()
            ),
            &format!("治疗{}侧后半规管耳石症的标准复位方法。", ear_zh.trim_matches(['【', '】'])),
        ),
        difficulty: Difficulty::Moderate,
        precautions: precautions.to_vec(),
        recommended_for: Indication {
            canal: CanalType::Posterior,
            side: Some(side),
        },
        steps,
    }
}

pub(super) fn title_case(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
