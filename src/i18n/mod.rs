//! Localized strings: placeholders, display labels and prompt templates.
//!
//! English is the default language; Russian is available as an alternative.
//! Unlike a process-wide locale, the language is passed explicitly so that
//! pipelines and classifiers configured for different languages can coexist.

use serde::{Deserialize, Serialize};

/// Supported languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    /// English (default)
    #[default]
    En,
    /// Russian
    Ru,
}

impl Lang {
    /// Parse a language code string (e.g. "en", "ru", "en_US", "ru_RU.UTF-8").
    /// Returns `None` for unrecognized codes.
    pub fn from_code(code: &str) -> Option<Self> {
        let normalized = code.to_lowercase();
        let prefix = normalized.split(['_', '-', '.']).next().unwrap_or("");
        match prefix {
            "en" => Some(Self::En),
            "ru" => Some(Self::Ru),
            _ => None,
        }
    }

    /// Return the ISO 639-1 code for this language.
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ru => "ru",
        }
    }
}

/// Detect language from `MAILLENS_LANG`, then `LC_MESSAGES` / `LANG`.
pub fn detect_system_lang() -> Lang {
    ["MAILLENS_LANG", "LC_MESSAGES", "LANG"]
        .iter()
        .find_map(|var| std::env::var(var).ok().and_then(|v| Lang::from_code(&v)))
        .unwrap_or_default()
}

/// Defines a localized message function taking the language explicitly.
macro_rules! msg {
    ($name:ident, $en:expr, $ru:expr) => {
        /// Returns a localized string for `lang`.
        pub fn $name(lang: Lang) -> &'static str {
            match lang {
                Lang::En => $en,
                Lang::Ru => $ru,
            }
        }
    };
}

// ── Prompt templates ────────────────────────────────────────────

msg!(category_prefix, "Email category:", "Категория писем:");
msg!(
    description_label,
    "Specific category description",
    "Конкретное описание категории"
);
msg!(classify_prefix, "Classify this email:", "Классифицируй это письмо:");

/// `"<category-prefix> <name>. <description-label>: <description>"`, or
/// `"<category-prefix> <name>"` without a description.
pub fn description_prompt(lang: Lang, name: &str, description: Option<&str>) -> String {
    match description.filter(|d| !d.is_empty()) {
        Some(description) => format!(
            "{} {name}. {}: {description}",
            category_prefix(lang),
            description_label(lang)
        ),
        None => format!("{} {name}", category_prefix(lang)),
    }
}

/// Prompt for the `k`-th (1-based) example of a category.
pub fn example_prompt(lang: Lang, name: &str, k: usize, example: &str) -> String {
    match lang {
        Lang::En => {
            format!("Example of category '{name}' #{k} (distinguishing traits): {example}...")
        }
        Lang::Ru => {
            format!("Пример письма категории '{name}' #{k} (уникальные черты): {example}...")
        }
    }
}

/// Prompt wrapping the text to classify.
pub fn classification_prompt(lang: Lang, text: &str) -> String {
    format!("{} {text}", classify_prefix(lang))
}

// ── Attachment placeholders ─────────────────────────────────────

/// Placeholder for a zero-length attachment.
pub fn empty_file(lang: Lang, filename: &str) -> String {
    match lang {
        Lang::En => format!("Empty file: {filename}"),
        Lang::Ru => format!("Пустой файл: {filename}"),
    }
}

/// Descriptor for formats that are never extracted.
pub fn binary_file(lang: Lang, filename: &str, size: usize, ext: &str) -> String {
    match lang {
        Lang::En => format!("Binary file: {filename}, size: {size} bytes, type: {ext}"),
        Lang::Ru => format!("Бинарный файл: {filename}, размер: {size} байт, тип: {ext}"),
    }
}

/// Placeholder for a format whose support was compiled out.
pub fn format_unavailable(lang: Lang, format: &str, filename: &str) -> String {
    match lang {
        Lang::En => format!("[{format} content unavailable in this build: {filename}]"),
        Lang::Ru => format!("[{format} содержимое недоступно в этой сборке: {filename}]"),
    }
}

msg!(
    extraction_failed,
    "Could not extract data from attachment",
    "Не удалось извлечь данные из вложения"
);

/// Marker prefixed to the text of an attached message.
pub fn nested_message(lang: Lang, filename: &str) -> String {
    match lang {
        Lang::En => format!("Nested message: {filename}"),
        Lang::Ru => format!("Вложенное письмо: {filename}"),
    }
}

/// Header line introducing one worksheet.
pub fn sheet_header(lang: Lang, sheet: &str) -> String {
    match lang {
        Lang::En => format!("--- Sheet: {sheet} ---"),
        Lang::Ru => format!("--- Лист: {sheet} ---"),
    }
}

// ── Document display labels ─────────────────────────────────────

/// Subject line for display, or the "no subject" label.
pub fn subject_line(lang: Lang, subject: &str) -> String {
    match (lang, subject.is_empty()) {
        (Lang::En, false) => format!("Subject: {subject}"),
        (Lang::Ru, false) => format!("Тема письма: {subject}"),
        (lang, true) => no_subject(lang).to_string(),
    }
}

/// Sender line for display.
pub fn sender_line(lang: Lang, sender: &str) -> String {
    match (lang, sender.is_empty()) {
        (Lang::En, false) => format!("From: {sender}"),
        (Lang::Ru, false) => format!("От: {sender}"),
        (Lang::En, true) => "Unknown sender".to_string(),
        (Lang::Ru, true) => "Неизвестный отправитель".to_string(),
    }
}

/// Recipient line for display.
pub fn recipient_line(lang: Lang, recipients: &str) -> String {
    match (lang, recipients.is_empty()) {
        (Lang::En, false) => format!("To: {recipients}"),
        (Lang::Ru, false) => format!("Кому: {recipients}"),
        (Lang::En, true) => "Unknown recipient".to_string(),
        (Lang::Ru, true) => "Неизвестный получатель".to_string(),
    }
}

/// Date line for display.
pub fn date_line(lang: Lang, date: &str) -> String {
    match (lang, date.is_empty()) {
        (Lang::En, false) => format!("Date: {date}"),
        (Lang::Ru, false) => format!("Дата: {date}"),
        (Lang::En, true) => "No date".to_string(),
        (Lang::Ru, true) => "Нет даты".to_string(),
    }
}

msg!(no_subject, "No subject", "Без темы");
msg!(body_label, "Email text", "Текст письма");
msg!(attachments_label, "Attachments", "Вложения");

// ── CLI ─────────────────────────────────────────────────────────

msg!(
    app_about,
    "Extract clean text from email messages and classify them by example",
    "Извлечение чистого текста из писем и классификация по примерам"
);
msg!(
    help_cmd_extract,
    "Extract and sanitize message text",
    "Извлечь и очистить текст писем"
);
msg!(
    help_cmd_classify,
    "Classify messages against categories from a TOML file",
    "Классифицировать письма по категориям из TOML-файла"
);
msg!(
    help_cmd_completions,
    "Generate shell completions",
    "Сгенерировать автодополнение для оболочки"
);
msg!(help_cmd_manpage, "Generate a man page", "Сгенерировать man-страницу");
msg!(err_file_not_found, "File not found", "Файл не найден");
msg!(msg_processing, "Processing", "Обработка");
msg!(msg_loading_categories, "Embedding categories", "Векторизация категорий");
msg!(label_file, "File", "Файл");
msg!(label_urls, "Links", "Ссылки");
msg!(label_category, "Category", "Категория");
msg!(label_similarity, "Similarity", "Близость");
msg!(
    msg_no_categories,
    "No categories to classify against",
    "Нет категорий для классификации"
);
msg!(
    msg_provider_unavailable,
    "Embedding provider unavailable",
    "Сервис эмбеддингов недоступен"
);
msg!(undetermined, "Undetermined", "Не определена");
