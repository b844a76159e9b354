use crate::types::Language;

/// User-facing strings that leave the library (error text, prompts).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Message {
    AnalysisFailed,
    NoFrames,
    CameraUnavailable,
    SourceNotReady,
    UploadFailed,
    Analyzing,
    Capturing,
    Extracting,
    PrecautionsTitle,
    Done,
    TreatmentCancelled,
    StepperHelp,
    NoRecommendation,
}

pub fn text(message: Message, lang: Language) -> &'static str {
    use Message::*;

    match lang {
        Language::En => match message {
            AnalysisFailed => "Analysis failed. Please try uploading a clear video file.",
            NoFrames => "No frames were captured. Please try again.",
            CameraUnavailable => "Unable to access camera. Please check permissions.",
            SourceNotReady => "Camera not ready. Please wait a moment and try again.",
            UploadFailed => "Could not process the video. Switched back to the camera.",
            Analyzing => "Analyzing eye movement...",
            Capturing => "Recording",
            Extracting => "Extracting frames",
            PrecautionsTitle => "Post-treatment precautions",
            Done => "Done",
            TreatmentCancelled => "Treatment cancelled.",
            StepperHelp => "[n]ext  [p]revious  [t]imer start/pause  [r]eset timer  [q]uit",
            NoRecommendation => "No maneuver recommended. Consult a clinician if symptoms persist.",
        },
        Language::Zh => match message {
            AnalysisFailed => "分析因网络或技术错误中断。请尝试上传本地录制的清晰视频。",
            NoFrames => "未采集到任何画面，请重试。",
            CameraUnavailable => "无法访问摄像头，请检查权限设置。",
            SourceNotReady => "摄像头尚未就绪，请稍后重试。",
            UploadFailed => "视频处理失败，已切换回摄像头。",
            Analyzing => "正在分析眼动...",
            Capturing => "录制中",
            Extracting => "提取画面",
            PrecautionsTitle => "复位后注意事项",
            Done => "完成",
            TreatmentCancelled => "已取消治疗。",
            StepperHelp => "[n]下一步  [p]上一步  [t]开始/暂停计时  [r]重置计时  [q]退出",
            NoRecommendation => "暂无推荐的复位方法。如症状持续，请及时就医。",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_message_is_localized() {
        let all = [
            Message::AnalysisFailed,
            Message::NoFrames,
            Message::CameraUnavailable,
            Message::SourceNotReady,
            Message::UploadFailed,
            Message::Analyzing,
            Message::Capturing,
            Message::Extracting,
            Message::PrecautionsTitle,
            Message::Done,
            Message::TreatmentCancelled,
            Message::StepperHelp,
            Message::NoRecommendation,
        ];
        for message in all {
            assert!(!text(message, Language::En).is_empty());
            assert_ne!(text(message, Language::En), text(message, Language::Zh));
        }
    }
}
