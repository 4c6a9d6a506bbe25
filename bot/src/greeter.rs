use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const USERNAME_PLACEHOLDER: &str = "{username}";

pub const WELCOME_TEMPLATES: [&str; 4] = [
    "Welcome @{username} to SimpCity! \u{1F680}\u{1F525}",
    "Aree bhai! Ek aur simp aaya! \u{1F606} Welcome @{username}! \u{1F389}",
    "@{username} just entered the simp zone. Buckle up! \u{1F602}",
    "Ek naye simp ki entry hui hai! @{username}, welcome bhai! \u{1F480}\u{1F525}",
];

pub fn render(template: &str, username: &str) -> String {
    template.replace(USERNAME_PLACEHOLDER, username)
}

/// Picks a welcome template at random for each newcomer.
#[derive(Debug, Clone)]
pub struct Greeter {
    rng: StdRng,
}

impl Greeter {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn welcome(&mut self, username: &str) -> String {
        let template = WELCOME_TEMPLATES[self.rng.gen_range(0..WELCOME_TEMPLATES.len())];
        render(template, username)
    }
}
