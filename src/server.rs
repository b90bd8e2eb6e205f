// src/server.rs
// Comunicação com o servidor de puzzles: resultado da rodada, votos e próximo puzzle

// Biblioteca padrão
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

// Bibliotecas externas
use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use serde::Deserialize;

// Módulos internos
use crate::{
    config,
    puzzle::{PuzzleData, PuzzleRound, PuzzleUser, PuzzleVote, RecentRound, RoundResult},
};

/// Operações que o controlador pede ao servidor
pub trait PuzzleServer {
    /// Registra o resultado da rodada
    fn round(&mut self, id: u32, win: bool) -> Result<PuzzleRound>;
    /// Vota no puzzle; devolve o novo placar
    fn vote(&mut self, id: u32, up: bool) -> Result<PuzzleVote>;
    fn next_puzzle(&mut self) -> Result<PuzzleData>;
}

/// Arquivo de lote: um único PuzzleData ou uma lista
#[derive(Deserialize)]
#[serde(untagged)]
enum Batch {
    Many(Vec<PuzzleData>),
    One(Box<PuzzleData>),
}

/// Servidor local que entrega puzzles de um lote em memória.
/// Não calcula rating: toda rodada tem variação zero.
#[derive(Debug, Clone, Default)]
pub struct BatchServer {
    queue:  VecDeque<PuzzleData>,
    user:   Option<PuzzleUser>,
    scores: HashMap<u32, i32>,
    votes:  HashMap<u32, bool>,
}

impl BatchServer {
    pub fn new(batch: Vec<PuzzleData>) -> Self {
        let user = batch.iter().find_map(|d| d.user.clone());
        let scores = batch.iter().map(|d| (d.puzzle.id, d.puzzle.vote)).collect();
        Self { queue: batch.into(), user, scores, votes: HashMap::new() }
    }

    /// Carrega o lote de um arquivo JSON
    pub fn load(path: &Path) -> Result<Self> {
        info!("carregando lote de puzzles: {}", path.display());
        let file = File::open(path).with_context(|| format!("abrir {}", path.display()))?;
        let batch: Batch = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("lote inválido em {}", path.display()))?;
        let puzzles = match batch {
            Batch::Many(v) => v,
            Batch::One(d) => vec![*d],
        };
        debug!("{} puzzles no lote", puzzles.len());
        Ok(Self::new(puzzles))
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn user(&self) -> Option<&PuzzleUser> {
        self.user.as_ref()
    }
}

impl PuzzleServer for BatchServer {
    fn round(&mut self, id: u32, win: bool) -> Result<PuzzleRound> {
        let user = self.user.get_or_insert_with(|| PuzzleUser { rating: config::DEFAULT_RATING, recent: Vec::new() });
        user.recent.insert(0, RecentRound(id, user.rating, 0));
        user.recent.truncate(config::RECENT_MAX);
        debug!("rodada do puzzle {id}: {}", if win { "vitória" } else { "derrota" });
        Ok(PuzzleRound {
            user:  user.clone(),
            round: Some(RoundResult { rating_diff: 0, win }),
            voted: self.votes.get(&id).copied(),
        })
    }

    fn vote(&mut self, id: u32, up: bool) -> Result<PuzzleVote> {
        let score = self.scores.get_mut(&id).ok_or_else(|| anyhow!("puzzle {id} desconhecido"))?;
        // Trocar o voto desfaz o anterior
        let delta = match self.votes.insert(id, up) {
            Some(prev) if prev == up => 0,
            Some(_) => 2,
            None => 1,
        };
        *score += if up { delta } else { -delta };
        Ok(PuzzleVote(up, *score))
    }

    fn next_puzzle(&mut self) -> Result<PuzzleData> {
        let mut data = self.queue.pop_front().ok_or_else(|| anyhow!("não há mais puzzles no lote"))?;
        let id = data.puzzle.id;
        if let Some(score) = self.scores.get(&id) {
            data.puzzle.vote = *score;
        }
        if self.user.is_some() {
            data.user = self.user.clone();
            data.voted = Some(self.votes.get(&id).copied());
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::puzzle::tests::SAMPLE;

    fn server() -> BatchServer {
        let data: PuzzleData = serde_json::from_str(SAMPLE).unwrap();
        let mut second = data.clone();
        second.puzzle.id = 61023;
        BatchServer::new(vec![data, second])
    }

    #[test]
    fn serves_puzzles_in_order() {
        let mut s = server();
        assert_eq!(s.next_puzzle().unwrap().puzzle.id, 61022);
        assert_eq!(s.next_puzzle().unwrap().puzzle.id, 61023);
        assert!(s.next_puzzle().is_err());
    }

    #[test]
    fn rounds_are_recorded_without_rating_change() {
        let mut s = server();
        let r = s.round(61022, true).unwrap();
        assert_eq!(r.round, Some(RoundResult { rating_diff: 0, win: true }));
        assert_eq!(r.user.recent[0], RecentRound(61022, 1500, 0));
        assert_eq!(r.user.recent.len(), 3);
        for i in 0..20 { s.round(i, false).unwrap(); }
        assert_eq!(s.user().unwrap().recent.len(), config::RECENT_MAX);
    }

    #[test]
    fn votes_replace_previous_vote() {
        let mut s = server();
        assert_eq!(s.vote(61022, true).unwrap(), PuzzleVote(true, 13));
        assert_eq!(s.vote(61022, true).unwrap(), PuzzleVote(true, 13));
        assert_eq!(s.vote(61022, false).unwrap(), PuzzleVote(false, 11));
        assert!(s.vote(1, true).is_err());

        let next = s.next_puzzle().unwrap();
        assert_eq!(next.puzzle.vote, 11);
        assert_eq!(next.voted, Some(Some(false)));
    }

    #[test]
    fn anonymous_round_gets_default_user() {
        let mut data: PuzzleData = serde_json::from_str(SAMPLE).unwrap();
        data.user = None;
        let mut s = BatchServer::new(vec![data]);
        assert!(s.user().is_none());
        assert_eq!(s.next_puzzle().unwrap().voted, Some(None));
        let r = s.round(61022, false).unwrap();
        assert_eq!(r.user.rating, config::DEFAULT_RATING);
    }
}
