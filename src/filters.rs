// Extraction of structured search hints (RAM, storage, CPU, GPU, screen, OS)
use crate::model::Specs;
use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;

struct SpecPatterns {
    ram: Regex,
    storage: Regex,
    cpu: Vec<(Regex, &'static str)>,
    gpu: Vec<Regex>,
    screen: Regex,
    os: Vec<(&'static str, Regex)>,
}

static PATTERNS: OnceLock<SpecPatterns> = OnceLock::new();

fn insensitive(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .expect("spec pattern")
}

fn patterns() -> &'static SpecPatterns {
    PATTERNS.get_or_init(|| SpecPatterns {
        ram: Regex::new(r"(\d+)\s*(?:GB|Gb|ГБ|Гб)").expect("ram pattern"),
        storage: Regex::new(r"(?:SSD|HDD)\s*(\d+)\s*(?:GB|Gb|ГБ|Гб|TB|Tb|ТБ|Тб)")
            .expect("storage pattern"),
        cpu: vec![
            (insensitive(r"Core i(\d+)[- ](\d+)"), "Intel Core i"),
            (insensitive(r"Ryzen (\d+)[- ](\d+)"), "AMD Ryzen "),
            (insensitive(r"Core Ultra (\d+)[- ](\d+)"), "Intel Core Ultra "),
        ],
        gpu: vec![
            insensitive(r"(?:GeForce|NVIDIA)\s*(?:RTX|GTX)\s*(\d+)"),
            insensitive(r"Radeon\s*(?:RX)?\s*(\d+)"),
            insensitive(r"Intel\s*(?:UHD|Iris)\s*(\d+)?"),
        ],
        screen: Regex::new(r#"(\d+(?:[.,]\d+)?)\s*(?:"|”|″)"#).expect("screen pattern"),
        os: vec![
            ("windows", insensitive(r"Windows\s*\d+(?:\s*(?:Home|Pro))?")),
            ("no_os", insensitive(r"Без ОС|Без операционн")),
            ("dos", insensitive(r"DOS")),
            ("linux", insensitive(r"Linux")),
        ],
    })
}

/// Извлекает характеристики из строки запроса.
pub fn extract_specs(query: &str) -> Specs {
    let p = patterns();
    let mut specs = Specs::default();

    specs.ram = p.ram.captures(query).map(|c| c[1].to_string());
    specs.storage = p.storage.captures(query).map(|c| c[1].to_string());

    specs.processor = p.cpu.iter().find_map(|(regex, prefix)| {
        regex
            .captures(query)
            .map(|c| format!("{}{} {}", prefix, &c[1], &c[2]))
    });

    specs.graphics = p
        .gpu
        .iter()
        .find_map(|regex| regex.find(query).map(|m| m.as_str().trim().to_string()));

    specs.screen_size = p.screen.captures(query).map(|c| c[1].replace(',', "."));

    specs.os = p
        .os
        .iter()
        .find(|(_, regex)| regex.is_match(query))
        .map(|(name, _)| name.to_string());

    specs
}
