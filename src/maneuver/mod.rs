mod bbq;
mod epley;
mod foster;

use std::{collections::HashMap, fmt, str::FromStr, time::Duration};

use crate::types::{CanalType, DiagnosisResult, Language, Side};

/// Target body configuration, in degrees (and scene units for `y_offset`).
///
/// `torso_angle`: 90 sitting, 0 supine, 180 folded forward.
/// `body_roll`: 0 on the back, 90 on the right side, -90 on the left side.
/// `body_yaw`: 0 feet toward the footboard, 90 facing the left bed edge.
/// `head_yaw`: relative to the torso, positive turns left.
/// `head_pitch`: positive tucks the chin, negative extends the neck.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BodyPose {
    pub torso_angle: f32,
    pub body_roll: f32,
    pub body_yaw: f32,
    pub head_yaw: f32,
    pub head_pitch: f32,
    pub leg_angle: f32,
    pub knee_angle: f32,
    pub arm_angle: f32,
    pub elbow_angle: f32,
    pub y_offset: f32,
}

impl BodyPose {
    pub const SEATED: BodyPose = BodyPose {
        torso_angle: 90.0,
        body_roll: 0.0,
        body_yaw: 0.0,
        head_yaw: 0.0,
        head_pitch: 0.0,
        leg_angle: 0.0,
        knee_angle: 0.0,
        arm_angle: 0.0,
        elbow_angle: 0.0,
        y_offset: 0.0,
    };

    /// Sitting upright with the head facing forward. Body yaw is free so a
    /// patient may end on the bed edge.
    pub fn is_seated_upright(&self) -> bool {
        (self.torso_angle - 90.0).abs() < 1e-3
            && self.body_roll.rem_euclid(360.0).min(360.0 - self.body_roll.rem_euclid(360.0)) < 1e-3
            && self.head_yaw.abs() < 1e-3
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ManeuverStep {
    pub title: String,
    pub description: String,
    pub duration_secs: u32,
    pub pose: BodyPose,
    /// Portion of the crystal path covered while this step is held.
    pub progress: (f32, f32),
}

impl ManeuverStep {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs as u64)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Difficulty {
    Easy,
    Moderate,
    Advanced,
}

impl Difficulty {
    pub fn label(self, lang: Language) -> &'static str {
        match (self, lang) {
            (Difficulty::Easy, Language::En) => "easy",
            (Difficulty::Moderate, Language::En) => "moderate",
            (Difficulty::Advanced, Language::En) => "advanced",
            (Difficulty::Easy, Language::Zh) => "简单",
            (Difficulty::Moderate, Language::Zh) => "中等",
            (Difficulty::Advanced, Language::Zh) => "较难",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Indication {
    pub canal: CanalType,
    pub side: Option<Side>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Maneuver {
    pub id: &'static str,
    pub name: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub precautions: Vec<String>,
    pub recommended_for: Indication,
    pub steps: Vec<ManeuverStep>,
}

impl Maneuver {
    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(ManeuverStep::duration).sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    Epley,
    Foster,
    Bbq,
}

impl Protocol {
    pub const ALL: [Protocol; 3] = [Protocol::Epley, Protocol::Foster, Protocol::Bbq];

    /// The canal this protocol repositions.
    pub fn canal(self) -> CanalType {
        match self {
            Protocol::Epley => CanalType::Posterior,
            Protocol::Foster => CanalType::Anterior,
            Protocol::Bbq => CanalType::Horizontal,
        }
    }

    pub fn for_canal(canal: CanalType) -> Self {
        match canal {
            CanalType::Posterior => Protocol::Epley,
            CanalType::Anterior => Protocol::Foster,
            CanalType::Horizontal => Protocol::Bbq,
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "epley" => Ok(Protocol::Epley),
            "foster" | "half-somersault" => Ok(Protocol::Foster),
            "bbq" | "roll" | "lempert" => Ok(Protocol::Bbq),
            other => Err(format!("unknown protocol `{other}` (expected epley, foster or bbq)")),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Epley => "epley",
            Protocol::Foster => "foster",
            Protocol::Bbq => "bbq",
        })
    }
}

/// Picks the localized string for `lang`.
pub(crate) fn tr(lang: Language, en: &str, zh: &str) -> String {
    match lang {
        Language::En => en.to_string(),
        Language::Zh => zh.to_string(),
    }
}

pub(crate) fn step(
    lang: Language,
    title: (&str, &str),
    description: (&str, &str),
    duration_secs: u32,
    pose: BodyPose,
    progress: (f32, f32),
) -> ManeuverStep {
    ManeuverStep {
        title: tr(lang, title.0, title.1),
        description: tr(lang, description.0, description.1),
        duration_secs,
        pose,
        progress,
    }
}

fn common_precautions(lang: Language) -> Vec<String> {
    let lines: [(&str, &str); 5] = [
        (
            "Sit quietly for 10 minutes after the maneuver.",
            "复位后静坐 10 分钟，不要立刻大幅度移动。",
        ),
        (
            "Sleep with your head elevated (use extra pillows) tonight.",
            "今晚睡觉时将枕头垫高，保持头部抬高 45 度。",
        ),
        (
            "Avoid bending over or looking up high for 24 hours.",
            "24 小时内避免低头捡东西或仰头看天花板。",
        ),
        (
            "Avoid vigorous exercise for one week.",
            "一周内避免剧烈运动或头部剧烈晃动。",
        ),
        (
            "Seek medical attention if dizziness persists or worsens.",
            "如果眩晕持续或加重，请立即就医。",
        ),
    ];
    lines.iter().map(|(en, zh)| tr(lang, en, zh)).collect()
}

/// Every maneuver for one display language. Built once, read-only afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Catalog {
    lang: Language,
    maneuvers: HashMap<(Protocol, Side), Maneuver>,
}

impl Catalog {
    pub fn new(lang: Language) -> Self {
        let precautions = common_precautions(lang);
        let mut maneuvers = HashMap::new();
        for side in [Side::Left, Side::Right] {
            maneuvers.insert((Protocol::Epley, side), epley::build(lang, side, &precautions));
            maneuvers.insert((Protocol::Foster, side), foster::build(lang, side, &precautions));
            maneuvers.insert((Protocol::Bbq, side), bbq::build(lang, side, &precautions));
        }
        Self { lang, maneuvers }
    }

    pub fn lang(&self) -> Language {
        self.lang
    }

    pub fn lookup(&self, protocol: Protocol, side: Side) -> Option<&Maneuver> {
        self.maneuvers.get(&(protocol, side))
    }

    /// All maneuvers in a stable display order.
    pub fn all(&self) -> Vec<&Maneuver> {
        Protocol::ALL
            .iter()
            .flat_map(|&protocol| [Side::Left, Side::Right].map(move |side| (protocol, side)))
            .filter_map(|key| self.maneuvers.get(&key))
            .collect()
    }

    /// The maneuver for a positive diagnosis with a known side and canal.
    pub fn recommend(&self, diagnosis: &DiagnosisResult) -> Option<&Maneuver> {
        if !diagnosis.has_bppv {
            return None;
        }
        let side = diagnosis.side?;
        let canal = diagnosis.canal?;
        self.lookup(Protocol::for_canal(canal), side)
    }
}

/// Instruction poses shown before the provocation recording: sit and turn the
/// head toward the tested ear, then lie back with the neck extended.
pub fn diagnostic_poses(side: Side) -> [BodyPose; 2] {
    let head_yaw = 45.0 * side.yaw_sign();
    [
        BodyPose {
            head_yaw,
            ..BodyPose::SEATED
        },
        BodyPose {
            torso_angle: 0.0,
            head_yaw,
            head_pitch: -20.0,
            ..BodyPose::default()
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positive(side: Option<Side>, canal: Option<CanalType>) -> DiagnosisResult {
        DiagnosisResult {
            has_bppv: true,
            side,
            canal,
            confidence: 0.9,
            reasoning: String::new(),
        }
    }

    #[test]
    fn test_catalog_is_pure_per_language() {
        assert_eq!(Catalog::new(Language::En), Catalog::new(Language::En));
        assert_ne!(Catalog::new(Language::En), Catalog::new(Language::Zh));
    }

    #[test]
    fn test_every_protocol_and_side_is_present() {
        let catalog = Catalog::new(Language::Zh);
        for protocol in Protocol::ALL {
            for side in [Side::Left, Side::Right] {
                let maneuver = catalog.lookup(protocol, side).unwrap();
                assert_eq!(maneuver.recommended_for.canal, protocol.canal());
                assert_eq!(maneuver.recommended_for.side, Some(side));
            }
        }
        assert_eq!(catalog.all().len(), 6);
    }

    #[test]
    fn test_steps_hold_invariants() {
        let catalog = Catalog::new(Language::En);
        for maneuver in catalog.all() {
            let steps = &maneuver.steps;
            assert!(!steps.is_empty(), "{} has no steps", maneuver.id);
            assert!(steps.iter().all(|step| step.duration_secs > 0), "{}", maneuver.id);

            assert_eq!(steps[0].progress.0, 0.0, "{}", maneuver.id);
            assert_eq!(steps[steps.len() - 1].progress.1, 1.0, "{}", maneuver.id);
            for step in steps {
                assert!(step.progress.0 <= step.progress.1, "{}: {}", maneuver.id, step.title);
            }
            for pair in steps.windows(2) {
                assert_eq!(pair[0].progress.1, pair[1].progress.0, "{}", maneuver.id);
            }

            let last = &steps[steps.len() - 1].pose;
            assert!(last.is_seated_upright(), "{} does not end seated: {last:?}", maneuver.id);
        }
    }

    #[test]
    fn test_left_and_right_mirror_head_yaw() {
        let catalog = Catalog::new(Language::En);
        for protocol in Protocol::ALL {
            let left = catalog.lookup(protocol, Side::Left).unwrap();
            let right = catalog.lookup(protocol, Side::Right).unwrap();
            assert_eq!(left.steps.len(), right.steps.len());
            for (l, r) in left.steps.iter().zip(&right.steps) {
                assert_eq!(l.pose.head_yaw, -r.pose.head_yaw);
                assert_eq!(l.pose.body_roll, -r.pose.body_roll);
                assert_eq!(l.pose.torso_angle, r.pose.torso_angle);
            }
        }
    }

    #[test]
    fn test_recommendation_follows_canal_and_side() {
        let catalog = Catalog::new(Language::En);
        let posterior = catalog
            .recommend(&positive(Some(Side::Right), Some(CanalType::Posterior)))
            .unwrap();
        assert_eq!(posterior.id, "epley_right");
        let horizontal = catalog
            .recommend(&positive(Some(Side::Left), Some(CanalType::Horizontal)))
            .unwrap();
        assert_eq!(horizontal.id, "bbq_left");
        let anterior = catalog
            .recommend(&positive(Some(Side::Left), Some(CanalType::Anterior)))
            .unwrap();
        assert_eq!(anterior.id, "foster_left");

        assert!(catalog.recommend(&positive(None, Some(CanalType::Posterior))).is_none());
        assert!(catalog.recommend(&positive(Some(Side::Left), None)).is_none());
        assert!(catalog.recommend(&DiagnosisResult::negative("clear")).is_none());
    }

    #[test]
    fn test_diagnostic_poses_turn_toward_test_side() {
        let [sit, lie] = diagnostic_poses(Side::Right);
        assert_eq!(sit.torso_angle, 90.0);
        assert_eq!(sit.head_yaw, -45.0);
        assert_eq!(lie.torso_angle, 0.0);
        assert_eq!(lie.head_pitch, -20.0);
        assert_eq!(diagnostic_poses(Side::Left)[1].head_yaw, 45.0);
    }

    #[test]
    fn test_is_seated_upright_allows_full_turns() {
        let pose = BodyPose {
            body_roll: -360.0,
            body_yaw: 90.0,
            ..BodyPose::SEATED
        };
        assert!(pose.is_seated_upright());
        assert!(!BodyPose { head_yaw: 10.0, ..BodyPose::SEATED }.is_seated_upright());
    }

    #[test]
    fn test_protocol_parsing() {
        assert_eq!("Epley".parse::<Protocol>().unwrap(), Protocol::Epley);
        assert_eq!("lempert".parse::<Protocol>().unwrap(), Protocol::Bbq);
        assert!("semont".parse::<Protocol>().is_err());
    }
}
