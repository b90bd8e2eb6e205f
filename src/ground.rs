// src/ground.rs
// ---------------------------------------------------------------------------
// Configuração do tabuleiro (CgConfig) e interface do componente de tabuleiro
// (CgApi). A renderização em si fica fora deste crate.
// ---------------------------------------------------------------------------

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};
use shakmaty::{uci::UciMove, Color, Position, Square};

use crate::{
    prefs::{Coords, PuzzlePrefs},
    puzzle::color_serde,
    tree::{self, Node, NodeMark},
    vm::Mode,
};

/// Peças que o usuário pode mover e destinos legais por casa de origem
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movable {
    #[serde(default, with = "opt_color")]
    pub color:      Option<Color>,
    pub dests:      BTreeMap<String, Vec<String>>,
    pub show_dests: bool,
    pub rook_castle: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlight {
    pub last_move: bool,
    pub check:     bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardAnimation {
    pub enabled:  bool,
    pub duration: u32,
}

/// Fotografia da configuração do tabuleiro
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardConfig {
    pub fen:         String,
    #[serde(with = "color_serde")]
    pub orientation: Color,
    #[serde(with = "color_serde")]
    pub turn_color:  Color,
    pub movable:     Movable,
    pub premovable:  bool,
    pub check:       bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_move:   Option<[String; 2]>,
    pub coordinates: bool,
    pub highlight:   Highlight,
    pub animation:   BoardAnimation,
    pub draggable:   bool,
    pub selectable:  bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            fen: String::new(),
            orientation: Color::White,
            turn_color: Color::White,
            movable: Movable::default(),
            premovable: false,
            check: false,
            last_move: None,
            coordinates: true,
            highlight: Highlight::default(),
            animation: BoardAnimation::default(),
            draggable: true,
            selectable: true,
        }
    }
}

/// Cor opcional como "white" | "black" | null
mod opt_color {
    use serde::{Deserialize, Deserializer, Serializer};
    use shakmaty::Color;

    pub fn serialize<S: Serializer>(c: &Option<Color>, s: S) -> Result<S::Ok, S::Error> {
        match c {
            Some(c) => s.serialize_some(crate::puzzle::color_name(*c)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Color>, D::Error> {
        Ok(Option::<String>::deserialize(d)?.and_then(|s| crate::puzzle::parse_color(&s)))
    }
}

/// Interface do componente de tabuleiro
pub trait Ground {
    fn set(&mut self, config: &BoardConfig);
    fn select_square(&mut self, key: Option<Square>);
    fn cancel_premove(&mut self);
}

/// Destinos legais agrupados pela casa de origem
pub fn legal_dests(fen: &str) -> BTreeMap<String, Vec<String>> {
    let pos = match tree::parse_position(fen) {
        Ok(p) => p,
        Err(e) => { warn!("destinos indisponíveis: {e}"); return BTreeMap::new(); }
    };
    let mut dests: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for m in pos.legal_moves() {
        if let UciMove::Normal { from, to, .. } = UciMove::from_move(&m, shakmaty::CastlingMode::Standard) {
            let list = dests.entry(from.to_string()).or_default();
            let to = to.to_string();
            if !list.contains(&to) { list.push(to); }
        }
    }
    dests.values_mut().for_each(|l| l.sort());
    dests
}

/// Último lance como [origem, destino]
pub fn uci_to_last_move(uci: Option<&str>) -> Option<[String; 2]> {
    match uci?.parse::<UciMove>().ok()? {
        UciMove::Normal { from, to, .. } => Some([from.to_string(), to.to_string()]),
        UciMove::Put { to, .. } => Some([to.to_string(), to.to_string()]),
        UciMove::Null => None,
    }
}

/// Parâmetros do puzzle necessários para montar a configuração
pub struct CgContext<'a> {
    pub node:         &'a Node,
    pub puzzle_color: Color,
    pub mode:         Mode,
    pub initial_ply:  u32,
    pub prefs:        &'a PuzzlePrefs,
}

/// Monta a configuração do tabuleiro para o nó atual
pub fn make_cg_config(ctx: &CgContext<'_>) -> BoardConfig {
    let node = ctx.node;
    let color = node.turn();
    let dests = legal_dests(&node.fen);
    let next = node.children.first();
    let can_move = ctx.mode == Mode::View
        || (color == ctx.puzzle_color && next.map_or(true, |n| n.puzzle == Some(NodeMark::Fail)));

    let mut config = BoardConfig {
        fen: node.fen.clone(),
        orientation: ctx.puzzle_color,
        turn_color: color,
        movable: Movable {
            color: (can_move && !dests.is_empty()).then_some(color),
            dests,
            show_dests: ctx.prefs.destination,
            rook_castle: ctx.prefs.rook_castle,
        },
        premovable: false,
        check: node.check,
        last_move: uci_to_last_move(node.uci.as_deref()),
        coordinates: ctx.prefs.coords != Coords::Hidden,
        highlight: Highlight { last_move: ctx.prefs.highlight, check: ctx.prefs.highlight },
        animation: BoardAnimation {
            enabled: ctx.prefs.animation.duration > 0,
            duration: ctx.prefs.animation.duration,
        },
        draggable: ctx.prefs.move_event.draggable(),
        selectable: ctx.prefs.move_event.selectable(),
    };

    // Vez do oponente durante a solução: o usuário pode pré-mover
    if node.ply >= ctx.initial_ply && ctx.mode != Mode::View && color != ctx.puzzle_color {
        config.movable.color = Some(ctx.puzzle_color);
        // destinos são do oponente: pré-lances não usam a lista
        config.movable.dests.clear();
        config.premovable = true;
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{child_node, root_node};

    fn ctx<'a>(node: &'a Node, mode: Mode, prefs: &'a PuzzlePrefs) -> CgContext<'a> {
        CgContext { node, puzzle_color: Color::White, mode, initial_ply: 0, prefs }
    }

    #[test]
    fn start_position_has_twenty_moves() {
        let root = root_node(None).unwrap();
        let dests = legal_dests(&root.fen);
        assert_eq!(dests.values().map(Vec::len).sum::<usize>(), 20);
        assert_eq!(dests["g1"], vec!["f3".to_string(), "h3".to_string()]);
    }

    #[test]
    fn user_turn_is_movable() {
        let prefs = PuzzlePrefs::default();
        let root = root_node(None).unwrap();
        let cfg = make_cg_config(&ctx(&root, Mode::Play, &prefs));
        assert_eq!(cfg.movable.color, Some(Color::White));
        assert_eq!(cfg.orientation, Color::White);
        assert!(!cfg.premovable);
        assert!(cfg.last_move.is_none());
    }

    #[test]
    fn opponent_turn_enables_premove() {
        let prefs = PuzzlePrefs::default();
        let root = root_node(None).unwrap();
        let e4 = child_node(&root, "e2e4").unwrap();
        let cfg = make_cg_config(&ctx(&e4, Mode::Play, &prefs));
        assert_eq!(cfg.turn_color, Color::Black);
        assert_eq!(cfg.movable.color, Some(Color::White));
        assert!(cfg.premovable);
        assert!(cfg.movable.dests.is_empty());
        assert_eq!(cfg.last_move, Some(["e2".to_string(), "e4".to_string()]));

        let view = make_cg_config(&ctx(&e4, Mode::View, &prefs));
        assert_eq!(view.movable.color, Some(Color::Black));
        assert!(!view.movable.dests.is_empty());
        assert!(!view.premovable);
    }

    #[test]
    fn last_move_ignores_malformed_uci() {
        assert_eq!(uci_to_last_move(Some("aéb1")), None);
        assert_eq!(uci_to_last_move(Some("e2")), None);
        assert_eq!(uci_to_last_move(Some("e7e8q")), Some(["e7".to_string(), "e8".to_string()]));
        assert_eq!(uci_to_last_move(None), None);
    }

    #[test]
    fn serializes_for_the_board_widget() {
        let prefs = PuzzlePrefs::default();
        let root = root_node(None).unwrap();
        let cfg = make_cg_config(&ctx(&root, Mode::Play, &prefs));
        let v = serde_json::to_value(&cfg).unwrap();
        assert_eq!(v["turnColor"], "white");
        assert_eq!(v["movable"]["color"], "white");
        assert!(v["movable"]["dests"]["e2"].is_array());
    }
}
