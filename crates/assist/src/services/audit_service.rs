//! The personal risk audit: a fixed checklist scored into a risk band.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use cybermitra_database::{AuditRepository, AuditRun};

use crate::types::{AssistError, AssistResult};

#[derive(Debug, Clone, Serialize)]
pub struct AuditQuestion {
    pub id: &'static str,
    pub prompt: &'static str,
    /// Contribution of a safe answer to the total score.
    pub weight: u32,
    /// Shown when the answer is unsafe.
    pub recommendation: &'static str,
}

const QUESTIONS: &[AuditQuestion] = &[
    AuditQuestion {
        id: "unique-passwords",
        prompt: "Do you use a different password for every important account?",
        weight: 20,
        recommendation: "Use a password manager and stop reusing passwords; one leaked site should not unlock your bank.",
    },
    AuditQuestion {
        id: "two-factor",
        prompt: "Is two-factor authentication enabled on your email and banking apps?",
        weight: 20,
        recommendation: "Turn on two-factor authentication for email and banking first; they guard everything else.",
    },
    AuditQuestion {
        id: "os-updates",
        prompt: "Do you install phone and computer updates within a few days of release?",
        weight: 10,
        recommendation: "Enable automatic updates; most malware exploits already-patched holes.",
    },
    AuditQuestion {
        id: "unknown-apps",
        prompt: "Do you avoid installing APKs or apps from outside official stores?",
        weight: 15,
        recommendation: "Sideloaded APKs are the main carrier of banking trojans in India; stick to official stores.",
    },
    AuditQuestion {
        id: "otp-sharing",
        prompt: "Do you refuse to share OTPs, even with callers claiming to be your bank?",
        weight: 20,
        recommendation: "No bank or official ever needs your OTP; sharing one is handing over the account.",
    },
    AuditQuestion {
        id: "public-wifi",
        prompt: "Do you avoid banking or payments on public Wi-Fi?",
        weight: 5,
        recommendation: "Use mobile data for payments when travelling; open Wi-Fi is trivially snooped.",
    },
    AuditQuestion {
        id: "screen-lock",
        prompt: "Is your phone protected with a PIN, pattern or biometric lock?",
        weight: 5,
        recommendation: "A lost unlocked phone exposes UPI apps, email and saved passwords at once.",
    },
    AuditQuestion {
        id: "backup",
        prompt: "Do you keep a backup of important files and photos?",
        weight: 5,
        recommendation: "Backups turn ransomware from a catastrophe into an inconvenience.",
    },
];

/// Answer map keyed by question id; `true` means the safe behaviour.
pub type AuditAnswers = BTreeMap<String, bool>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub score: i64,
    pub risk_band: String,
    pub recommendations: Vec<String>,
}

pub struct AuditService {
    runs: AuditRepository,
}

impl AuditService {
    pub fn new(runs: AuditRepository) -> Self {
        Self { runs }
    }

    pub fn questions(&self) -> &'static [AuditQuestion] {
        QUESTIONS
    }

    /// Score the submitted answers and persist the run.
    pub async fn run(&self, user_id: i64, answers: &AuditAnswers) -> AssistResult<AuditReport> {
        for id in answers.keys() {
            if !QUESTIONS.iter().any(|q| q.id == id) {
                return Err(AssistError::invalid(format!("unknown question: {id}")));
            }
        }
        for question in QUESTIONS {
            if !answers.contains_key(question.id) {
                return Err(AssistError::invalid(format!(
                    "missing answer for: {}",
                    question.id
                )));
            }
        }

        let total: u32 = QUESTIONS.iter().map(|q| q.weight).sum();
        let earned: u32 = QUESTIONS
            .iter()
            .filter(|q| answers.get(q.id).copied().unwrap_or(false))
            .map(|q| q.weight)
            .sum();
        let score = (earned as i64 * 100) / total as i64;

        let risk_band = match score {
            80..=100 => "low",
            50..=79 => "moderate",
            _ => "high",
        };

        let recommendations = QUESTIONS
            .iter()
            .filter(|q| !answers.get(q.id).copied().unwrap_or(false))
            .map(|q| q.recommendation.to_string())
            .collect();

        self.runs
            .insert(user_id, score, risk_band, &serde_json::to_string(answers)?)
            .await?;

        Ok(AuditReport {
            score,
            risk_band: risk_band.to_string(),
            recommendations,
        })
    }

    pub async fn history(&self, user_id: i64) -> AssistResult<Vec<AuditRun>> {
        Ok(self.runs.list_for_user(user_id).await?)
    }
}
