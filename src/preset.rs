//! User-facing wording. The generic helmet checker and the scooter rental
//! eligibility check share one workflow and differ only in the text they
//! show and the instruction they send to the model.

use serde::{Deserialize, Serialize};

/// Which wording the front end uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Plain "is a helmet worn" check
    #[default]
    Generic,

    /// Helmet check gating a scooter rental
    ScooterRental,
}

/// All text for one preset. Templates use `{confidence}`, `{error}` and
/// `{status}` placeholders.
#[derive(Debug, Clone, Serialize)]
pub struct Wording {
    pub title: &'static str,
    pub description: &'static str,
    pub upload_label: &'static str,
    pub image_caption: &'static str,
    pub button_label: &'static str,
    pub processing_label: &'static str,
    /// Sent to the model after the image
    pub instruction: &'static str,
    pub success_template: &'static str,
    pub failure_template: &'static str,
    pub parse_error_template: &'static str,
    /// The model service answered with an error status
    pub service_error_template: &'static str,
    /// The model service could not be reached
    pub network_error_message: &'static str,
    pub eligibility_notice: Option<&'static str>,
}

const GENERIC: Wording = Wording {
    title: "🏍️ 헬멧 착용 여부 판별기",
    description: "사진을 업로드하면 GPT-4o Vision으로 헬멧 착용 여부를 알려줍니다.",
    upload_label: "📸 사진 업로드",
    image_caption: "업로드된 이미지",
    button_label: "판별 시작",
    processing_label: "판별 중… 잠시만 기다려 주세요",
    instruction: "이 사진에서 사람이 헬멧을 쓰고 있는지 여부를 \
                  JSON 형식 {\"helmet\": bool, \"confidence\": int} 으로만 답해주세요. \
                  confidence는 0에서 100 사이의 정수입니다.",
    success_template: "✅ 헬멧 착용 (신뢰도: {confidence}%)",
    failure_template: "❌ 헬멧 미착용 (신뢰도: {confidence}%)",
    parse_error_template: "GPT 응답 파싱 오류: {error}",
    service_error_template: "판별 요청에 실패했습니다. 다시 시도해 주세요. (HTTP {status})",
    network_error_message: "판별 서비스에 연결하지 못했습니다. 다시 시도해 주세요.",
    eligibility_notice: None,
};

const SCOOTER_RENTAL: Wording = Wording {
    title: "🛴 킥보드 대여 헬멧 확인",
    description: "킥보드를 대여하려면 헬멧을 착용해야 합니다. \
                  헬멧을 쓴 사진을 업로드하면 대여 가능 여부를 알려드립니다.",
    upload_label: "📸 헬멧 착용 사진 업로드",
    image_caption: "업로드된 이미지",
    button_label: "대여 자격 확인",
    processing_label: "확인 중… 잠시만 기다려 주세요",
    instruction: "This photo is used to check eligibility for a scooter rental. \
                  Decide whether the rider in the photo is wearing a helmet. \
                  Answer only with a JSON object {\"helmet\": bool, \"confidence\": int} \
                  where confidence is an integer from 0 to 100, with no other text.",
    success_template: "✅ 헬멧 착용이 확인되었습니다. 킥보드를 대여할 수 있습니다. (신뢰도: {confidence}%)",
    failure_template: "❌ 헬멧 미착용으로 킥보드를 대여할 수 없습니다. 헬멧을 착용한 뒤 다시 시도해 주세요. (신뢰도: {confidence}%)",
    parse_error_template: "응답을 해석하지 못했습니다: {error}",
    service_error_template: "확인 요청에 실패했습니다. 다시 시도해 주세요. (HTTP {status})",
    network_error_message: "확인 서비스에 연결하지 못했습니다. 다시 시도해 주세요.",
    eligibility_notice: Some("헬멧 착용이 확인된 경우에만 대여가 가능합니다."),
};

impl Preset {
    pub fn wording(&self) -> &'static Wording {
        match self {
            Preset::Generic => &GENERIC,
            Preset::ScooterRental => &SCOOTER_RENTAL,
        }
    }
}

impl Wording {
    pub fn success_message(&self, confidence: u8) -> String {
        fill(self.success_template, "{confidence}", &confidence.to_string())
    }

    pub fn failure_message(&self, confidence: u8) -> String {
        fill(self.failure_template, "{confidence}", &confidence.to_string())
    }

    pub fn parse_error_message(&self, error: &str) -> String {
        fill(self.parse_error_template, "{error}", error)
    }

    pub fn service_error_message(&self, status: u16) -> String {
        fill(self.service_error_template, "{status}", &status.to_string())
    }
}

fn fill(template: &str, placeholder: &str, value: &str) -> String {
    template.replace(placeholder, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_embed_confidence() {
        for preset in [Preset::Generic, Preset::ScooterRental] {
            let wording = preset.wording();
            assert!(wording.success_message(87).contains("87"));
            assert!(wording.failure_message(42).contains("42"));
            assert!(!wording.success_message(87).contains("{confidence}"));
        }
    }

    #[test]
    fn test_generic_wording() {
        let wording = Preset::Generic.wording();
        assert_eq!(wording.success_message(87), "✅ 헬멧 착용 (신뢰도: 87%)");
        assert_eq!(wording.failure_message(42), "❌ 헬멧 미착용 (신뢰도: 42%)");
        assert_eq!(
            wording.parse_error_message("expected value"),
            "GPT 응답 파싱 오류: expected value"
        );
        assert!(wording.eligibility_notice.is_none());
    }

    #[test]
    fn test_scooter_rental_gates_eligibility() {
        let wording = Preset::ScooterRental.wording();
        assert!(wording.eligibility_notice.is_some());
        assert!(wording.failure_message(10).contains("대여할 수 없습니다"));
        assert!(wording.success_message(99).contains("대여할 수 있습니다"));
    }

    #[test]
    fn test_instructions_demand_the_json_shape() {
        for preset in [Preset::Generic, Preset::ScooterRental] {
            let instruction = preset.wording().instruction;
            assert!(instruction.contains("\"helmet\": bool"));
            assert!(instruction.contains("\"confidence\": int"));
        }
    }

    #[test]
    fn test_service_error_carries_only_the_status() {
        for preset in [Preset::Generic, Preset::ScooterRental] {
            let wording = preset.wording();
            let message = wording.service_error_message(401);
            assert!(message.ends_with("(HTTP 401)"));
            assert!(!message.contains("{"));
            assert!(!wording.network_error_message.contains("{"));
        }
    }

    #[test]
    fn test_preset_serde_names() {
        let preset: Preset = serde_json::from_str("\"scooter-rental\"").unwrap();
        assert_eq!(preset, Preset::ScooterRental);
        assert_eq!(serde_json::to_string(&Preset::Generic).unwrap(), "\"generic\"");
    }
}
