// src/lines.rs
// ---------------------------------------------------------------------------
// Árvore de linhas esperadas do puzzle: { uci: Lines } | "win" | "fail"
// ---------------------------------------------------------------------------

use std::{collections::HashMap, fmt};

use anyhow::{anyhow, bail, Result};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use serde::{
    de::{self, MapAccess, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};
use shakmaty::{fen::Fen, uci::UciMove, Chess, EnPassantMode, Position};

use crate::config;

lazy_static! {
    // Roque pode chegar como rei→torre (e1h1) ou rei→casa final (e1g1)
    static ref ALT_CASTLES: HashMap<&'static str, &'static str> = [
        ("e1a1", "e1c1"), ("e1c1", "e1a1"),
        ("e1h1", "e1g1"), ("e1g1", "e1h1"),
        ("e8a8", "e8c8"), ("e8c8", "e8a8"),
        ("e8h8", "e8g8"), ("e8g8", "e8h8"),
    ].into_iter().collect();
}

/// Notação alternativa de um roque, se existir
pub fn alt_castle(uci: &str) -> Option<&'static str> {
    ALT_CASTLES.get(uci).copied()
}

/// Trie de sequências de lances; toda folha é uma vitória ou uma derrota.
///
/// A ordem das chaves importa: a primeira chave de um mapa é a resposta
/// esperada do oponente.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lines {
    Win,
    Fail,
    Continue(IndexMap<String, Lines>),
}

/// Lance já jogado, como aparece no caminho da árvore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayedMove {
    pub uci:    String,
    pub castle: bool,
}

impl PlayedMove {
    pub fn new(uci: impl Into<String>, castle: bool) -> Self {
        Self { uci: uci.into(), castle }
    }
}

impl Lines {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Lines::Continue(_))
    }

    /// Sub-linhas após um lance, sem considerar aliases de roque
    pub fn get(&self, uci: &str) -> Option<&Lines> {
        match self {
            Lines::Continue(map) => map.get(uci),
            _ => None,
        }
    }

    /// Primeira ramificação (resposta esperada)
    pub fn first_branch(&self) -> Option<(&str, &Lines)> {
        match self {
            Lines::Continue(map) => map.first().map(|(k, v)| (k.as_str(), v)),
            _ => None,
        }
    }

    /// Percorre os lances jogados. Um terminal alcançado antes do fim
    /// permanece como resultado; lance desconhecido devolve `None`.
    pub fn follow<'a, I>(&self, moves: I) -> Option<&Lines>
    where
        I: IntoIterator<Item = &'a PlayedMove>,
    {
        let mut cur = self;
        for mv in moves {
            cur = match cur {
                Lines::Continue(map) => map.get(&mv.uci).or_else(|| {
                    if mv.castle { alt_castle(&mv.uci).and_then(|alt| map.get(alt)) } else { None }
                })?,
                terminal => return Some(terminal),
            };
        }
        Some(cur)
    }

    /// Há alguma folha "win" abaixo deste nó?
    pub fn has_win(&self) -> bool {
        match self {
            Lines::Win => true,
            Lines::Fail => false,
            Lines::Continue(map) => map.values().any(Lines::has_win),
        }
    }

    /// Primeiro caminho vencedor, em uci
    pub fn solution(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut cur = self;
        while let Lines::Continue(map) = cur {
            let next = map.iter().find(|(_, l)| l.has_win()).or_else(|| map.first());
            let Some((uci, sub)) = next else { break };
            out.push(uci.clone());
            cur = sub;
            if out.len() >= config::MAX_LINES_DEPTH { break; }
        }
        out
    }

    /// Conta folhas (vitórias, derrotas)
    pub fn leaves(&self) -> (usize, usize) {
        match self {
            Lines::Win => (1, 0),
            Lines::Fail => (0, 1),
            Lines::Continue(map) => map.values().map(Lines::leaves).fold((0, 0), |(w, f), (a, b)| (w + a, f + b)),
        }
    }

    /// Maior número de lances até uma folha
    pub fn depth(&self) -> usize {
        match self {
            Lines::Continue(map) => 1 + map.values().map(Lines::depth).max().unwrap_or(0),
            _ => 0,
        }
    }

    /// Verificação estrutural: mapas não vazios, chaves uci válidas,
    /// profundidade limitada. As folhas já são "win"/"fail" pelo tipo.
    pub fn validate(&self) -> Result<()> {
        self.validate_at(&mut Vec::new())
    }

    fn validate_at(&self, prefix: &mut Vec<String>) -> Result<()> {
        if prefix.len() > config::MAX_LINES_DEPTH {
            bail!("linhas profundas demais após {}", prefix.join(" "));
        }
        let Lines::Continue(map) = self else { return Ok(()) };
        if map.is_empty() {
            bail!("mapa de linhas vazio após [{}]", prefix.join(" "));
        }
        for (uci, sub) in map {
            if !matches!(uci.parse::<UciMove>(), Ok(UciMove::Normal { .. })) {
                bail!("lance uci inválido '{}' após [{}]", uci, prefix.join(" "));
            }
            prefix.push(uci.clone());
            sub.validate_at(prefix)?;
            prefix.pop();
        }
        Ok(())
    }

    /// Todos os lances das linhas são legais a partir de `pos`?
    pub fn check_legal(&self, pos: &Chess) -> Result<()> {
        let Lines::Continue(map) = self else { return Ok(()) };
        for (uci, sub) in map {
            let m = [Some(uci.as_str()), alt_castle(uci)]
                .into_iter()
                .flatten()
                .filter_map(|u| u.parse::<UciMove>().ok()?.to_move(pos).ok())
                .next()
                .ok_or_else(|| anyhow!("lance ilegal '{}' em {}", uci, Fen::from_position(pos.clone(), EnPassantMode::Legal)))?;
            let mut next = pos.clone();
            next.play_unchecked(&m);
            sub.check_legal(&next)?;
        }
        Ok(())
    }
}

impl Serialize for Lines {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Lines::Win => s.serialize_str("win"),
            Lines::Fail => s.serialize_str("fail"),
            Lines::Continue(map) => map.serialize(s),
        }
    }
}

impl<'de> Deserialize<'de> for Lines {
    fn deserialize<D: Deserializer<'de>>(de: D) -> std::result::Result<Self, D::Error> {
        struct LinesVisitor;

        impl<'de> Visitor<'de> for LinesVisitor {
            type Value = Lines;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("\"win\", \"fail\" ou um mapa de lances uci")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Lines, E> {
                match v {
                    "win" => Ok(Lines::Win),
                    "fail" => Ok(Lines::Fail),
                    other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
                }
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Lines, A::Error> {
                let mut map = IndexMap::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry::<String, Lines>()? {
                    map.insert(k, v);
                }
                Ok(Lines::Continue(map))
            }
        }

        de.deserialize_any(LinesVisitor)
    }
}
