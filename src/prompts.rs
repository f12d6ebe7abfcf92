//! Prompt texts for the vision, research, and proposal inference calls.
//!
//! Centralising every prompt here keeps a single source of truth and lets
//! unit tests inspect prompt contents without touching a real model. The
//! fixed fallback sentences (no available zones, generation failure) also
//! live here so the composer and its tests agree on the exact wording.

use crate::output::{AdZone, Language};

/// System prompt for the zone-classification call.
pub const VISION_SYSTEM_PROMPT: &str = "You are an expert web advertising analyst. \
You examine website screenshots and judge advertising placement opportunities. \
Always respond with valid JSON only, no commentary and no markdown fences.";

/// User prompt accompanying the screenshot attachment.
///
/// The taxonomy and the reply schema are fixed; the model fills in
/// occupancy, size hints, priorities, and rationales, and detects the page
/// language (ru/en).
pub fn vision_user_prompt(url: &str) -> String {
    format!(
        r#"Analyse this screenshot of {url} and identify advertising placement zones.

Evaluate visually where ads could be placed:
1. Header (top of the page, navigation area)
2. Sidebar (left or right column)
3. Content (within or between main content blocks)
4. Footer (bottom of the page)
5. Popup (overlay or modal opportunities)

For each zone that exists on the page return:
- "name": the zone name from the list above
- "available": true if the slot is free, false if it already carries an ad
- "size": recommended banner size, e.g. "728x90" or "300x250"
- "priority": "high" for the most visible slots, "medium" for less visible, "low" otherwise
- "reason": one sentence on where the zone sits and why it is or is not suitable

Judge occupancy honestly: only mark a zone available when there is genuinely free space.
Only include zones that actually exist on this page.

Also detect the page's natural language.

Return JSON of this exact shape:
{{
  "zones": [
    {{"name": "Header", "available": true, "size": "728x90", "priority": "high", "reason": "..."}}
  ],
  "language": "ru" or "en"
}}"#
    )
}

/// Prompt for the supplementary company-research call.
pub fn research_prompt(company: &str, url: &str, language: Language) -> String {
    match language {
        Language::Ru => format!(
            "Найди общедоступную информацию о компании \"{company}\" (сайт: {url}).\n\n\
             Интересует: полное название и юридическая форма, имя руководителя (если известно), \
             основная деятельность, заметные факты или достижения.\n\
             Если информации нет, честно напиши, что не найдено.\n\
             Верни короткий отчёт из 3-5 предложений на русском языке."
        ),
        Language::En => format!(
            "Find publicly available information about the company \"{company}\" (website: {url}).\n\n\
             Of interest: the full legal name, the name of the owner or director (if known), \
             the main line of business, and notable facts or achievements.\n\
             If nothing is known, say so honestly.\n\
             Return a short report of 3-5 sentences in English."
        ),
    }
}

/// Prompt for the proposal-generation call.
///
/// Both variants forbid literal asterisks; the composer additionally strips
/// them after generation so the guarantee does not rest on the model alone.
pub fn proposal_prompt(
    url: &str,
    company_name: Option<&str>,
    owner_info: Option<&str>,
    zones: &[&AdZone],
    language: Language,
) -> String {
    let zone_lines: Vec<String> = zones
        .iter()
        .enumerate()
        .map(|(i, zone)| {
            let size = if zone.size_hint.is_empty() {
                String::new()
            } else {
                format!(" ({})", zone.size_hint)
            };
            format!("{}. {}{} — {}", i + 1, zone.name, size, zone.reason)
        })
        .collect();
    let zones_description = zone_lines.join("\n");

    match language {
        Language::Ru => format!(
            "Сгенерируй персонализированное коммерческое предложение на РУССКОМ языке \
             о размещении рекламы.\n\n\
             Сайт: {url}\n\
             Компания: {company}\n\
             Информация о владельце: {owner}\n\
             Доступные рекламные места:\n{zones_description}\n\n\
             Напиши профессиональное письмо по структуре:\n\
             1. Приветствие (персонализированное, если есть имя)\n\
             2. Конкретный комплимент про их сайт или контент\n\
             3. Кратко о нашей рекламной платформе\n\
             4. Перечисление доступных рекламных зон с обоснованием\n\
             5. Ценностное предложение\n\
             6. Призыв к действию\n\n\
             Профессиональный тон. Без звёздочек (*) и другой markdown-разметки.",
            company = company_name.unwrap_or("Владелец сайта"),
            owner = owner_info.unwrap_or("Не найдена"),
        ),
        Language::En => format!(
            "Generate a personalised commercial proposal in ENGLISH for advertising placement.\n\n\
             Website: {url}\n\
             Company: {company}\n\
             Owner info: {owner}\n\
             Available ad zones:\n{zones_description}\n\n\
             Write a professional email with this structure:\n\
             1. Greeting (personalised if an owner name is available)\n\
             2. A concrete compliment about their website or content\n\
             3. A brief pitch of our advertising platform\n\
             4. The list of available ad zones with their rationale\n\
             5. A value proposition\n\
             6. A call to action\n\n\
             Professional and persuasive tone. Do not use asterisk characters (*) \
             or any other markdown markup.",
            company = company_name.unwrap_or("the website owner"),
            owner = owner_info.unwrap_or("Not available"),
        ),
    }
}

/// Fixed sentence returned when no zone is available — the inference
/// capability is not invoked in that case.
pub fn no_zones_sentence(language: Language) -> &'static str {
    match language {
        Language::Ru => {
            "Свободные рекламные зоны на сайте не обнаружены: все подходящие места уже заняты."
        }
        Language::En => {
            "No available advertising zones were found on this site: every suitable slot is \
             already occupied."
        }
    }
}

/// Fixed placeholder returned when proposal generation fails.
pub fn proposal_fallback(language: Language) -> &'static str {
    match language {
        Language::Ru => {
            "Не удалось сгенерировать коммерческое предложение. Пожалуйста, попробуйте ещё раз \
             позже."
        }
        Language::En => "Failed to generate a proposal. Please try again later.",
    }
}
