// src/trans.rs
// Traduções da interface: chave → texto, com substituição de %s e %1$s

use std::{collections::HashMap, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use log::trace;

#[derive(Debug, Clone, Default)]
pub struct Trans {
    i18n: HashMap<String, Option<String>>,
}

impl Trans {
    pub fn new(i18n: HashMap<String, Option<String>>) -> Self {
        Self { i18n }
    }

    /// Carrega um mapa { chave: texto } de um arquivo JSON
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("abrir {}", path.display()))?;
        let i18n = serde_json::from_reader(BufReader::new(file)).context("traduções inválidas")?;
        Ok(Self { i18n })
    }

    pub fn into_inner(self) -> HashMap<String, Option<String>> {
        self.i18n
    }

    /// Texto sem argumentos; devolve a própria chave se não houver tradução
    pub fn noarg(&self, key: &str) -> String {
        match self.i18n.get(key) {
            Some(Some(text)) => text.clone(),
            _ => {
                trace!("tradução ausente: {key}");
                key.to_string()
            }
        }
    }

    /// Texto com argumentos: %s consome em ordem, %N$s é posicional
    pub fn with(&self, key: &str, args: &[&str]) -> String {
        let template = self.noarg(key);
        let mut out = String::with_capacity(template.len());
        let mut next = 0;
        let mut rest = template.as_str();
        while let Some(i) = rest.find('%') {
            out.push_str(&rest[..i]);
            let tail = &rest[i + 1..];
            if let Some(after) = tail.strip_prefix('s') {
                out.push_str(args.get(next).copied().unwrap_or(""));
                next += 1;
                rest = after;
                continue;
            }
            let digits: String = tail.chars().take_while(char::is_ascii_digit).collect();
            if !digits.is_empty() && tail[digits.len()..].starts_with("$s") {
                let idx = digits.parse::<usize>().unwrap_or(0);
                out.push_str(idx.checked_sub(1).and_then(|k| args.get(k)).copied().unwrap_or(""));
                rest = &tail[digits.len() + 2..];
                continue;
            }
            out.push('%');
            rest = tail;
        }
        out.push_str(rest);
        out
    }
}
