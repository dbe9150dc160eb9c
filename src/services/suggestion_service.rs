use crate::database::MongoDB;
use crate::middleware::auth::RequestIdentity;
use crate::models::{CareerDetail, CareerResult, ProfileAnswers};
use crate::services::guest_service;
use crate::services::llm_client::CompletionProvider;
use crate::services::validation;
use crate::utils::AppError;

pub const SYSTEM_PROMPT: &str =
    "You are a career counseling AI that provides detailed career analysis and recommendations.";

/// Number of professions every result is padded up to.
pub const EXPECTED_SUGGESTIONS: usize = 3;
pub const DEFAULT_IQ: u32 = 100;

const FALLBACK_PROFESSIONS: [&str; EXPECTED_SUGGESTIONS] =
    ["Software Developer", "Data Analyst", "Project Manager"];
const FALLBACK_MATCH: u32 = 70;
const FALLBACK_DESCRIPTION: &str = "A detailed analysis for this profession was not available. \
It was suggested based on the overall strengths in your profile.";

const NOT_SPECIFIED: &str = "Not specified";

pub fn build_prompt(answers: &ProfileAnswers) -> String {
    let optional = |value: &Option<String>| -> String {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or(NOT_SPECIFIED)
            .to_string()
    };

    let mut prompt = format!(
        "As a career counselor AI, analyze the following detailed profile to:
1. Estimate an IQ range based on the complexity of interests, skills, and education level
2. Suggest 3 most suitable professions that align with the profile
3. Provide detailed analysis for each suggestion including:
   - Skills match percentage
   - Growth potential
   - Work-life balance
   - Required additional skills or certifications
   - Salary range
   - Career progression path

Consider the following comprehensive profile:
Hobbies: {}
Skills: {}
Education: {}
Work Style Preference: {}
Areas of Interest: {}
Languages: {}
Certifications: {}
Experience Level: {}
",
        answers.hobbies.trim(),
        answers.skills.trim(),
        answers.education.trim(),
        answers.work_style.trim(),
        answers.interests.trim(),
        optional(&answers.languages),
        optional(&answers.certifications),
        optional(&answers.experience),
    );

    let extra = answers.additional_context();
    if !extra.is_empty() {
        prompt.push_str("\nAdditional context:\n");
        for (label, value) in extra {
            prompt.push_str(&format!("{}: {}\n", label, value));
        }
    }

    prompt.push_str(
        "
Provide a structured response with:
1. Estimated IQ range with explanation
2. Top 3 profession recommendations with detailed rationale
3. Comprehensive analysis for each profession including all the points mentioned above

Formatting rules:
- Start with a line \"IQ: <number>\" followed by the explanation.
- Then a line \"Professions:\" followed by a numbered list of the 3 professions, then a blank line.
- Then one block per profession separated by blank lines: the profession title on the first line, \
\"Match: <number>%\" on the next line, then the analysis.",
    );

    prompt
}

/// Turns the model's free text into a `CareerResult`, padded to `EXPECTED_SUGGESTIONS`.
pub fn parse_response(content: &str) -> CareerResult {
    let content = content.replace("\r\n", "\n");
    let iq = parse_iq(&content).unwrap_or(DEFAULT_IQ);
    let professions = parse_professions(&content);
    let details = parse_details(&content);

    let (professions, details) = pad_results(professions, details);

    CareerResult {
        iq,
        professions,
        details,
    }
}

/// First integer following an `IQ` mention on the same line.
fn parse_iq(content: &str) -> Option<u32> {
    content.match_indices("IQ").find_map(|(idx, _)| {
        let rest = &content[idx + 2..];
        let line = rest.split('\n').next().unwrap_or("");
        first_number(line)
    })
}

fn first_number(text: &str) -> Option<u32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    // Overlong numbers saturate so a later mention cannot take over
    Some(digits.parse().unwrap_or(u32::MAX))
}

/// Lines after the first `Profession:`/`Professions:` up to the next blank line.
fn parse_professions(content: &str) -> Vec<String> {
    let marker = ["Professions:", "Profession:"]
        .iter()
        .filter_map(|m| content.find(m).map(|idx| (idx, m.len())))
        .min_by_key(|(idx, _)| *idx);

    let Some((idx, len)) = marker else {
        return Vec::new();
    };

    let section = &content[idx + len..];
    let section = match section.find("\n\n") {
        Some(end) => &section[..end],
        None => section,
    };

    section
        .lines()
        .map(clean_item)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Blank-line separated blocks that carry a `Match:` line.
fn parse_details(content: &str) -> Vec<CareerDetail> {
    content
        .split("\n\n")
        .filter(|section| section.contains("Match:"))
        .filter_map(|section| {
            let section = section.trim_matches('\n');
            let mut lines = section.lines();
            let title = clean_item(lines.next()?);
            if title.is_empty() {
                return None;
            }
            let description = lines.collect::<Vec<_>>().join("\n").trim().to_string();
            Some(CareerDetail {
                title,
                match_percentage: parse_match_percentage(section).unwrap_or(0),
                description,
            })
        })
        .collect()
}

/// First `Match: 85%` in the section → 85. The percent sign is required; values are clamped to 100.
fn parse_match_percentage(section: &str) -> Option<u32> {
    section.match_indices("Match:").find_map(|(idx, marker)| {
        let rest = section[idx + marker.len()..].trim_start();
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() || !rest[digits.len()..].starts_with('%') {
            return None;
        }
        Some(digits.parse::<u32>().unwrap_or(u32::MAX).min(100))
    })
}

/// Strips list numbering, bullets and markdown emphasis from a line.
fn clean_item(line: &str) -> String {
    let mut item = line.trim();

    let numbered = item
        .find(|c: char| !c.is_ascii_digit())
        .filter(|&pos| pos > 0 && item[pos..].starts_with('.'));
    if let Some(pos) = numbered {
        item = item[pos + 1..].trim_start();
    }

    item = item
        .trim_start_matches(|c: char| c == '-' || c == '•')
        .trim_start();
    if let Some(stripped) = item.strip_prefix("* ") {
        item = stripped.trim_start();
    }

    item.trim_end_matches(':')
        .trim_matches(|c: char| c == '*' || c == '#')
        .trim()
        .trim_end_matches(':')
        .trim()
        .to_string()
}

fn pad_results(
    mut professions: Vec<String>,
    mut details: Vec<CareerDetail>,
) -> (Vec<String>, Vec<CareerDetail>) {
    let contains = |list: &[String], name: &str| {
        list.iter().any(|p| p.eq_ignore_ascii_case(name))
    };

    for detail in &details {
        if professions.len() >= EXPECTED_SUGGESTIONS {
            break;
        }
        if !contains(&professions, &detail.title) {
            professions.push(detail.title.clone());
        }
    }

    for fallback in FALLBACK_PROFESSIONS {
        if professions.len() >= EXPECTED_SUGGESTIONS {
            break;
        }
        if !contains(&professions, fallback) {
            professions.push(fallback.to_string());
        }
    }

    for profession in &professions {
        let covered = details.iter().any(|d| {
            let title = d.title.to_ascii_lowercase();
            let name = profession.to_ascii_lowercase();
            title.contains(&name) || name.contains(&title)
        });
        if !covered {
            details.push(CareerDetail {
                title: profession.clone(),
                match_percentage: FALLBACK_MATCH,
                description: FALLBACK_DESCRIPTION.to_string(),
            });
        }
    }

    (professions, details)
}

/// Prompt → model → parsed result. No persistence.
pub async fn generate(
    llm: &dyn CompletionProvider,
    answers: &ProfileAnswers,
) -> Result<CareerResult, AppError> {
    let prompt = build_prompt(answers);
    let content = llm.complete(SYSTEM_PROMPT, &prompt).await?;
    let result = parse_response(&content);

    log::info!(
        "🧠 Parsed suggestion: iq={}, professions={:?}",
        result.iq,
        result.professions
    );

    Ok(result)
}

/// Full suggestion flow: validation, guest allowance, AI call, guest history.
///
/// Signed-in users are unlimited. A guest's allowance is consumed before the AI
/// call, so a failed call still counts against it.
pub async fn suggest(
    db: &MongoDB,
    llm: &dyn CompletionProvider,
    identity: &RequestIdentity,
    answers: &ProfileAnswers,
) -> Result<CareerResult, AppError> {
    validation::validate_profile(answers)?;

    let guest_id = match identity {
        RequestIdentity::Guest(guest_id) => {
            let count = guest_service::reserve_prediction(db, guest_id).await?;
            log::info!("🎟️  Guest {} prediction {}", guest_id, count);
            Some(guest_id.as_str())
        }
        RequestIdentity::User(_) | RequestIdentity::Anonymous => None,
    };

    let result = generate(llm, answers).await?;

    if let Some(guest_id) = guest_id {
        // History is best effort; the user still gets the result
        if let Err(e) = guest_service::record_prediction(db, guest_id, answers, &result).await {
            log::error!("❌ Failed to store prediction for guest {}: {}", guest_id, e);
        }
    }

    Ok(result)
}
