// src/puzzle.rs
// ---------------------------------------------------------------------------
// Contratos de dados do puzzle: Puzzle, PuzzleData, PuzzleUser, PuzzleRound,
// PuzzleVote, MoveTest. Formato JSON idêntico ao consumido pela interface web.
// ---------------------------------------------------------------------------

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use shakmaty::{uci::UciMove, Color, Position, Role, Square};

use crate::{
    lines::Lines,
    tree::{self, Node, Path},
};

// ---------------------------------------------------------------------------
// Helpers serde para tipos do shakmaty
// ---------------------------------------------------------------------------
pub fn color_name(c: Color) -> &'static str {
    match c { Color::White => "white", Color::Black => "black" }
}

pub fn parse_color(s: &str) -> Option<Color> {
    match s { "white" => Some(Color::White), "black" => Some(Color::Black), _ => None }
}

/// Cor como "white" | "black"
pub mod color_serde {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use shakmaty::Color;

    pub fn serialize<S: Serializer>(c: &Color, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(super::color_name(*c))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Color, D::Error> {
        let s = String::deserialize(d)?;
        super::parse_color(&s).ok_or_else(|| de::Error::unknown_variant(&s, &["white", "black"]))
    }
}

/// Casa como "e2"
pub mod square_serde {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use shakmaty::Square;

    pub fn serialize<S: Serializer>(sq: &Square, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(sq)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Square, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(|_| de::Error::invalid_value(de::Unexpected::Str(&s), &"uma casa como e2"))
    }
}

/// Peça de promoção como "queen" | "rook" | ...
pub mod role_serde {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use shakmaty::Role;

    const NAMES: [(&str, Role); 6] = [
        ("pawn", Role::Pawn), ("knight", Role::Knight), ("bishop", Role::Bishop),
        ("rook", Role::Rook), ("queen", Role::Queen), ("king", Role::King),
    ];

    pub fn name(role: Role) -> &'static str {
        NAMES.iter().find(|(_, r)| *r == role).map_or("queen", |(n, _)| n)
    }

    pub fn serialize<S: Serializer>(role: &Option<Role>, s: S) -> Result<S::Ok, S::Error> {
        match role {
            Some(r) => s.serialize_some(name(*r)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Role>, D::Error> {
        let Some(s) = Option::<String>::deserialize(d)? else { return Ok(None) };
        NAMES
            .iter()
            .find(|(n, _)| *n == s)
            .map(|(_, r)| Some(*r))
            .ok_or_else(|| de::Error::unknown_variant(&s, &["pawn", "knight", "bishop", "rook", "queen", "king"]))
    }
}

/// Distingue campo ausente (None) de null (Some(None))
fn double_option<'de, T, D>(d: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(d).map(Some)
}

// ---------------------------------------------------------------------------
// Estruturas de dados
// ---------------------------------------------------------------------------
/// Puzzle: posição, cor do solucionador e linhas esperadas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Puzzle {
    pub id:      u32,
    pub enabled: bool,
    pub vote:    i32,                                             // Placar de votos
    #[serde(with = "color_serde")]
    pub color:   Color,                                           // Cor de quem resolve
    pub lines:   Lines,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch:  Option<Node>,                                    // Ramo da solução, encadeado por children[0]
}

/// Partida que leva à posição do puzzle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameData {
    pub tree_parts: Vec<Node>,
}

/// Rodada recente: (id do puzzle, rating, variação de rating)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentRound(pub u32, pub i32, pub i32);

impl RecentRound {
    pub fn puzzle_id(&self) -> u32 { self.0 }
    pub fn rating(&self) -> i32 { self.1 }
    pub fn rating_diff(&self) -> i32 { self.2 }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleUser {
    pub rating: i32,
    #[serde(default)]
    pub recent: Vec<RecentRound>,
}

/// Dados completos entregues ao widget
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PuzzleData {
    pub puzzle: Puzzle,
    pub game:   GameData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user:   Option<PuzzleUser>,
    /// None: campo ausente; Some(None): ainda não votou; Some(Some(v)): votou
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub voted:  Option<Option<bool>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResult {
    pub rating_diff: i32,
    pub win:         bool,
}

/// Resposta do servidor ao fim de uma rodada
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleRound {
    pub user:  PuzzleUser,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<RoundResult>,
    #[serde(default)]
    pub voted: Option<bool>,
}

/// Resposta a um voto: [para cima?, novo placar]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleVote(pub bool, pub i32);

impl PuzzleVote {
    pub fn up(&self) -> bool { self.0 }
    pub fn score(&self) -> i32 { self.1 }
}

/// Lance candidato a ser testado contra as linhas do puzzle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveTest {
    #[serde(with = "square_serde")]
    pub orig:      Square,
    #[serde(with = "square_serde")]
    pub dest:      Square,
    #[serde(default, with = "role_serde", skip_serializing_if = "Option::is_none")]
    pub promotion: Option<Role>,
    pub fen:       String,
    pub path:      Path,
}

impl MoveTest {
    /// Lance em notação uci (promoção em minúscula)
    pub fn uci(&self) -> String {
        match self.promotion {
            Some(role) => format!("{}{}{}", self.orig, self.dest, role.char()),
            None => format!("{}{}", self.orig, self.dest),
        }
    }
}

impl PuzzleData {
    /// Último nó de treeParts: posição em que o puzzle começa
    pub fn initial_node(&self) -> Option<&Node> {
        self.game.tree_parts.last()
    }

    /// Verificação de conformidade do formato
    pub fn check(&self) -> Result<()> {
        let id = self.puzzle.id;
        self.puzzle.lines.validate().with_context(|| format!("puzzle {id}: linhas inválidas"))?;
        if self.puzzle.lines.is_terminal() {
            bail!("puzzle {id}: linhas sem nenhum lance");
        }

        let parts = &self.game.tree_parts;
        let Some(last) = parts.last() else { bail!("puzzle {id}: treeParts vazio") };
        for w in parts.windows(2) {
            if w[0].ply.checked_add(1) != Some(w[1].ply) {
                bail!("puzzle {id}: ply {} seguido de {}", w[0].ply, w[1].ply);
            }
        }
        for part in parts.iter().skip(1) {
            let uci = part.uci.as_deref().unwrap_or_default();
            if !matches!(uci.parse::<UciMove>(), Ok(UciMove::Normal { .. } | UciMove::Put { .. })) {
                bail!("puzzle {id}: uci inválido '{uci}' no ply {}", part.ply);
            }
        }
        let pos = tree::parse_position(&last.fen).with_context(|| format!("puzzle {id}: posição inicial"))?;
        if pos.turn() != last.turn() {
            bail!("puzzle {id}: ply {} não corresponde ao lado a jogar do FEN", last.ply);
        }
        if last.turn() != self.puzzle.color {
            bail!("puzzle {id}: posição inicial não é a vez de {}", color_name(self.puzzle.color));
        }
        self.puzzle.lines.check_legal(&pos).with_context(|| format!("puzzle {id}: linhas"))?;
        Ok(())
    }
}
