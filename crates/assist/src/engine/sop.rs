//! Deterministic guidance engine over packaged incident-response SOPs.

use cybermitra_protocol::SourceReference;
use futures::stream::BoxStream;
use futures::StreamExt;
use tracing::debug;

use super::{AnswerChunk, AnswerEngine, AnswerRequest, EngineError};

/// How many words go into each streamed text fragment.
const WORDS_PER_CHUNK: usize = 6;

struct SopTopic {
    id: &'static str,
    title: &'static str,
    keywords: &'static [&'static str],
    steps: &'static [&'static str],
}

// TODO: localise the knowledge base once translated SOP text is available.
const TOPICS: &[SopTopic] = &[
    SopTopic {
        id: "sop-financial-fraud",
        title: "Financial and UPI fraud",
        keywords: &[
            "upi", "money", "bank", "account", "transaction", "debit", "credit", "paytm",
            "phonepe", "gpay", "fraud", "payment", "wallet", "netbanking",
        ],
        steps: &[
            "Immediately call the national cybercrime helpline 1930 and report the fraudulent transaction; reporting within the first few hours gives the best chance of freezing the money trail.",
            "Call your bank's 24x7 customer care, block the affected card or UPI handle, and ask for the transaction reference numbers in writing.",
            "File a complaint on the National Cybercrime Reporting Portal (cybercrime.gov.in) under 'Online Financial Fraud' and keep the acknowledgement number.",
            "Preserve evidence: screenshots of the transaction, SMS alerts, the fraudster's UPI id or phone number, and any chat messages.",
            "Do not share your OTP, PIN or card details with anyone claiming to reverse the transaction; recovery callers asking for codes are a second round of the same scam.",
        ],
    },
    SopTopic {
        id: "sop-phishing",
        title: "Phishing and fake websites",
        keywords: &[
            "phishing", "link", "email", "sms", "fake", "website", "clicked", "suspicious",
            "lottery", "prize", "kyc",
        ],
        steps: &[
            "Do not enter any credentials or OTPs on the suspicious page, and close it immediately.",
            "If you already submitted credentials, change that password right away from a trusted device and enable two-factor authentication.",
            "If banking details were entered, call 1930 and your bank to flag the account for suspicious activity.",
            "Report the phishing message or site on cybercrime.gov.in and forward phishing SMS to 7726 where your operator supports it.",
            "Run a malware scan if you downloaded any attachment from the message.",
        ],
    },
    SopTopic {
        id: "sop-account-compromise",
        title: "Social media or email account compromise",
        keywords: &[
            "instagram", "facebook", "whatsapp", "telegram", "twitter", "hacked", "locked",
            "compromised", "profile", "impersonation", "gmail",
        ],
        steps: &[
            "Use the platform's account-recovery flow immediately and set a new, unique password.",
            "Enable two-factor authentication and sign out all other sessions from the security settings.",
            "Warn your contacts that messages from the account may not be from you; attackers often ask your contacts for money.",
            "Report impersonation profiles to the platform and file a complaint on cybercrime.gov.in with screenshots.",
            "Review connected apps and recovery email/phone for changes the attacker may have planted.",
        ],
    },
    SopTopic {
        id: "sop-identity-theft",
        title: "Identity theft and document misuse",
        keywords: &[
            "aadhaar", "pan", "identity", "documents", "sim", "stolen", "misuse", "loan",
        ],
        steps: &[
            "Lock your Aadhaar biometrics through the UIDAI portal and check where it was used recently.",
            "Pull your credit report to spot loans or cards opened in your name, and dispute them in writing with the bureau.",
            "If a SIM was issued in your name fraudulently, report it to your operator and block it.",
            "File a complaint on cybercrime.gov.in under identity theft and keep copies of every acknowledgement.",
        ],
    },
    SopTopic {
        id: "sop-shopping-fraud",
        title: "Online shopping fraud",
        keywords: &[
            "order", "delivery", "seller", "refund", "shopping", "olx", "marketplace",
            "advance", "product",
        ],
        steps: &[
            "Collect the seller's listing, profile, phone number and your payment proof before the listing disappears.",
            "Raise a complaint with the marketplace's grievance officer; Indian e-commerce rules require a response timeline.",
            "If you paid by UPI or card, report the transaction to 1930 and your bank as a disputed payment.",
            "File the case on cybercrime.gov.in with all collected evidence.",
        ],
    },
];

const FALLBACK_STEPS: &[&str] = &[
    "If money or credentials are involved, call the national cybercrime helpline 1930 first.",
    "File a complaint on the National Cybercrime Reporting Portal (cybercrime.gov.in); it routes the case to your local cyber cell.",
    "Preserve all evidence before it disappears: screenshots, URLs, phone numbers, transaction ids and chat exports.",
    "For emergencies involving personal safety, call 112.",
];

/// Answers by matching the question against topic keywords and streaming
/// the matched SOP's steps. Falls back to general reporting guidance.
pub struct SopGuidanceEngine;

impl SopGuidanceEngine {
    pub fn new() -> Self {
        Self
    }

    fn select_topic(question: &str) -> Option<&'static SopTopic> {
        let question = question.to_lowercase();
        TOPICS
            .iter()
            .map(|topic| {
                let hits = topic
                    .keywords
                    .iter()
                    .filter(|keyword| question.contains(*keyword))
                    .count();
                (hits, topic)
            })
            .filter(|(hits, _)| *hits > 0)
            .max_by_key(|(hits, _)| *hits)
            .map(|(_, topic)| topic)
    }

    fn compose(request: &AnswerRequest) -> (String, Vec<SourceReference>) {
        match Self::select_topic(&request.question) {
            Some(topic) => {
                debug!(topic = topic.id, "matched guidance topic");
                let text = topic
                    .steps
                    .iter()
                    .enumerate()
                    .map(|(index, step)| format!("{}. {}", index + 1, step))
                    .collect::<Vec<_>>()
                    .join("\n");
                let sources = topic
                    .steps
                    .iter()
                    .enumerate()
                    .map(|(index, step)| {
                        SourceReference::new(
                            format!("{}-{}", topic.id, index + 1),
                            *step,
                            format!("Citizen SOP: {}", topic.title),
                        )
                    })
                    .collect();
                (text, sources)
            }
            None => {
                debug!("no guidance topic matched, using fallback");
                let text = FALLBACK_STEPS
                    .iter()
                    .enumerate()
                    .map(|(index, step)| format!("{}. {}", index + 1, step))
                    .collect::<Vec<_>>()
                    .join("\n");
                (text, Vec::new())
            }
        }
    }
}

impl Default for SopGuidanceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AnswerEngine for SopGuidanceEngine {
    fn answer(&self, request: AnswerRequest) -> BoxStream<'static, Result<AnswerChunk, EngineError>> {
        let (text, sources) = Self::compose(&request);

        let words: Vec<String> = text.split_inclusive(char::is_whitespace).map(str::to_string).collect();
        let mut chunks: Vec<AnswerChunk> = words
            .chunks(WORDS_PER_CHUNK)
            .map(|words| AnswerChunk::Text(words.concat()))
            .collect();
        chunks.push(AnswerChunk::Sources(sources));

        futures::stream::iter(chunks.into_iter().map(Ok)).boxed()
    }
}
