// src/ceval.rs
// ---------------------------------------------------------------------------
// Avaliação de posições: tipos de avaliação e estado do ceval (análise local)
// ---------------------------------------------------------------------------

use std::cmp::Ordering;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{config, tree::Path};

/// Score retornado pelo engine ou tablebase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score { Cp(i32), Mate(i32) }

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        use Score::*;
        match (self, other) {
            (Mate(a), Mate(b)) if a.signum() == b.signum() => b.cmp(a),
            (Mate(a), Mate(b)) => a.cmp(b),
            (Mate(a), Cp(_))   => if *a > 0 { Ordering::Greater } else { Ordering::Less },
            (Cp(_), Mate(b))   => if *b > 0 { Ordering::Less } else { Ordering::Greater },
            (Cp(a), Cp(b))     => a.cmp(b),
        }
    }
}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Linha principal (PV) de uma análise
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pv {
    pub moves: Vec<String>,                                       // Lances em uci
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cp:    Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mate:  Option<i32>,
}

impl Pv {
    pub fn new(moves: Vec<String>, score: Score) -> Self {
        match score {
            Score::Cp(cp) => Pv { moves, cp: Some(cp), mate: None },
            Score::Mate(m) => Pv { moves, cp: None, mate: Some(m) },
        }
    }

    pub fn score(&self) -> Option<Score> {
        self.mate.map(Score::Mate).or(self.cp.map(Score::Cp))
    }
}

/// Avaliação local produzida pelo motor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientEval {
    pub fen:   String,
    pub depth: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cp:    Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mate:  Option<i32>,
    pub pvs:   Vec<Pv>,
}

impl ClientEval {
    /// Primeiro lance da melhor PV
    pub fn best(&self) -> Option<&str> {
        self.pvs.first().and_then(|pv| pv.moves.first()).map(String::as_str)
    }
}

/// Avaliação fornecida pelo servidor junto com a árvore
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEval {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cp:   Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mate: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best: Option<String>,
}

/// Avaliações disponíveis para o nó atual
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeEvals {
    pub client: Option<ClientEval>,
    pub server: Option<ServerEval>,
}

/// Pedido de análise pendente, consumido pelo motor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CevalRequest {
    pub path:    Path,
    pub fen:     String,
    pub threat:  bool,
    pub depth:   u8,
    pub multipv: usize,
}

/// Estado do ceval: ligado/desligado e pedido pendente
#[derive(Debug, Clone)]
pub struct CevalCtrl {
    enabled: bool,
    depth:   u8,
    multipv: usize,
    pending: Option<CevalRequest>,
}

impl Default for CevalCtrl {
    fn default() -> Self {
        Self::new(config::DEFAULT_DEPTH, config::DEFAULT_MULTIPV)
    }
}

impl CevalCtrl {
    pub fn new(depth: u8, multipv: usize) -> Self {
        Self { enabled: false, depth, multipv: multipv.max(1), pending: None }
    }

    pub fn enabled(&self) -> bool { self.enabled }

    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
        if !self.enabled { self.stop(); }
        debug!("ceval {}", if self.enabled { "ligado" } else { "desligado" });
    }

    /// Agenda a análise de uma posição; substitui qualquer pedido anterior
    pub fn start(&mut self, path: &str, fen: &str, threat: bool) {
        if !self.enabled { return; }
        self.pending = Some(CevalRequest {
            path: path.to_string(),
            fen: fen.to_string(),
            threat,
            depth: self.depth,
            multipv: self.multipv,
        });
    }

    pub fn stop(&mut self) {
        self.pending = None;
    }

    pub fn is_computing(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<&CevalRequest> {
        self.pending.as_ref()
    }

    pub fn take_pending(&mut self) -> Option<CevalRequest> {
        self.pending.take()
    }
}

/// Inverte o lado a jogar de um FEN (modo ameaça); en passant deixa de valer
pub fn threat_fen(fen: &str) -> String {
    let mut parts: Vec<&str> = fen.split_whitespace().collect();
    if parts.len() > 1 {
        parts[1] = if parts[1] == "w" { "b" } else { "w" };
    }
    if parts.len() > 3 {
        parts[3] = "-";
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_order_prefers_short_mates() {
        assert!(Score::Mate(1) > Score::Mate(3));
        assert!(Score::Mate(3) > Score::Cp(900));
        assert!(Score::Cp(-900) > Score::Mate(-2));
        assert!(Score::Mate(-5) > Score::Mate(-2));
        assert!(Score::Cp(30) > Score::Cp(-10));
    }

    #[test]
    fn requests_only_when_enabled() {
        let mut ceval = CevalCtrl::default();
        ceval.start("", "fen", false);
        assert!(!ceval.is_computing());
        ceval.toggle();
        ceval.start("ab", "fen", true);
        let req = ceval.pending().unwrap();
        assert!(req.threat);
        assert_eq!(req.depth, config::DEFAULT_DEPTH);
        ceval.toggle();
        assert!(!ceval.is_computing());
    }

    #[test]
    fn threat_fen_swaps_turn() {
        let fen = "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq e6 0 2";
        assert_eq!(threat_fen(fen), "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 2");
    }

    #[test]
    fn client_eval_best_move() {
        let eval = ClientEval {
            fen: "x".into(),
            depth: 12,
            cp: Some(40),
            mate: None,
            pvs: vec![Pv::new(vec!["e2e4".into(), "e7e5".into()], Score::Cp(40))],
        };
        assert_eq!(eval.best(), Some("e2e4"));
        assert_eq!(eval.pvs[0].score(), Some(Score::Cp(40)));
    }
}
