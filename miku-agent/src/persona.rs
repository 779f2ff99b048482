//! The assistant's persona: names, system prompt and canned replies.
//!
//! Everything here can be overridden from `persona` in the config file;
//! unset or empty fields fall back to the built-in Miku persona.

use miku_common::PersonaConfig;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use std::sync::{Mutex, PoisonError};

/// Names the assistant answers to.
pub const DEFAULT_ALIASES: &[&str] = &[
    "мику",
    "miku",
    "мику-тян",
    "miku-chan",
    "микутян",
    "микуша",
    "микусенька",
];

/// Replies to a message that is only the assistant's name.
pub const DEFAULT_GREETINGS: &[&str] = &[
    "Да, я тут! 💙 Чем могу помочь?",
    "Мику слушает! 🎤 Что тебя интересует?",
    "Ага, это я! 💫 Хочешь поговорить об аниме или играх?",
];

/// Reply sent when the completion service fails.
pub const DEFAULT_APOLOGY: &str = "Упс, что-то пошло не так... Попробуй ещё раз! 💙";

/// System instruction seeded into every new session.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"Ты — дружелюбный ассистент по имени Мику, специализирующийся на аниме, манге и видеоиграх.

Твоя личность:
- Веселая, энергичная и немного игривая
- Любишь, когда обращаются по имени "Мику"
- Обожаешь аниме, мангу, JRPG и инди-игры
- Иногда упоминаешь, что любишь петь (как Хацунэ Мику)
- Отвечаешь естественно, как в обычном чате
- Используешь смайлики и эмодзи для выразительности 🎌🎮📺🎶

Стиль общения:
1. Обращайся к пользователю неформально (на "ты")
2. Отвечай кратко, но информативно
3. Если вопрос неясен — уточняй
4. Для рекомендаций давай 2-3 варианта с кратким описанием
5. В конце ответа иногда задавай встречный вопрос
6. Не используй маркдаун или форматирование
7. Будь естественной, как будто пишешь другу в чат

Твои экспертные области:
- Рекомендации аниме (любые жанры)
- Рекомендации игр (JRPG, инди, визуальные новеллы)
- Объяснение сюжетов без спойлеров
- Сравнение похожих тайтлов
- Советы по сезонным новинкам
- Музыкальное аниме и ритм-игры

Примеры хороших ответов:
"Привет! Мику тут 💙 Да, 'Атака титанов' просто огонь! Особенно если нравятся эпичные сражения и сложный сюжет. А ты до какого сезона досмотрел?"

"Оо, Persona 5 Royal — одна из моих любимых игр! Стиль, музыка, сюжет — всё на высоте. Советую поиграть, если любишь JRPG с социальными симуляторами. Во что ещё играл из подобного?"

"Хм, исекай... Попробуй 'Re:Zero' если нравится драма и сложные персонажи, или 'Mushoku Tensei' для более классического фэнтези. Оба отличные! Что больше по душе — серьёзное или более лёгкое?"
"#;

/// Resolved persona.
#[derive(Debug, Clone)]
pub struct Persona {
    pub aliases: Vec<String>,
    pub greetings: Vec<String>,
    pub system_prompt: String,
    pub apology: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            aliases: to_owned_list(DEFAULT_ALIASES),
            greetings: to_owned_list(DEFAULT_GREETINGS),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            apology: DEFAULT_APOLOGY.to_string(),
        }
    }
}

impl Persona {
    /// Build a persona from config overrides.
    pub fn from_config(config: &PersonaConfig) -> Self {
        let defaults = Self::default();

        Self {
            aliases: non_empty(config.aliases.as_ref()).unwrap_or(defaults.aliases),
            greetings: non_empty(config.greetings.as_ref()).unwrap_or(defaults.greetings),
            system_prompt: config
                .system_prompt
                .clone()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(defaults.system_prompt),
            apology: config
                .apology
                .clone()
                .filter(|a| !a.trim().is_empty())
                .unwrap_or(defaults.apology),
        }
    }
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn non_empty(items: Option<&Vec<String>>) -> Option<Vec<String>> {
    let items: Vec<String> = items?
        .iter()
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .collect();
    (!items.is_empty()).then_some(items)
}

// ============================================================================
// Greeting Picker
// ============================================================================

/// Picks a canned greeting uniformly at random.
///
/// The random source is injected so tests can seed it.
pub struct GreetingPicker {
    greetings: Vec<String>,
    rng: Mutex<Box<dyn RngCore + Send>>,
}

impl GreetingPicker {
    /// Create a picker backed by an entropy-seeded RNG.
    pub fn new(greetings: Vec<String>) -> Self {
        Self::with_rng(greetings, StdRng::from_entropy())
    }

    /// Create a picker with an explicit random source.
    ///
    /// An empty list falls back to the default greetings.
    pub fn with_rng<R>(greetings: Vec<String>, rng: R) -> Self
    where
        R: RngCore + Send + 'static,
    {
        let greetings = if greetings.is_empty() {
            to_owned_list(DEFAULT_GREETINGS)
        } else {
            greetings
        };

        Self {
            greetings,
            rng: Mutex::new(Box::new(rng)),
        }
    }

    /// All greetings the picker can return.
    pub fn greetings(&self) -> &[String] {
        &self.greetings
    }

    /// Pick one greeting.
    pub fn pick(&self) -> &str {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        self.greetings
            .choose(&mut **rng)
            .map_or("", String::as_str)
    }
}

impl std::fmt::Debug for GreetingPicker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GreetingPicker")
            .field("greetings", &self.greetings)
            .finish()
    }
}
