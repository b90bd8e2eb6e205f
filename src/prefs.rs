// src/prefs.rs
// Preferências de exibição e interação do usuário (PuzzlePrefs)

// Biblioteca padrão
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

// Bibliotecas externas
use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

// Módulos internos
use crate::config;

/// Exibição de coordenadas: 0 nenhuma, 1 dentro do tabuleiro, 2 fora
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Coords { Hidden, Inside, Outside }

impl TryFrom<u8> for Coords {
    type Error = String;
    fn try_from(v: u8) -> Result<Self, String> {
        match v {
            0 => Ok(Coords::Hidden),
            1 => Ok(Coords::Inside),
            2 => Ok(Coords::Outside),
            n => Err(format!("coords inválido: {n}")),
        }
    }
}

impl From<Coords> for u8 {
    fn from(c: Coords) -> u8 {
        match c { Coords::Hidden => 0, Coords::Inside => 1, Coords::Outside => 2 }
    }
}

/// Forma de mover peças: 0 clique, 1 arrastar, 2 ambos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MoveEvent { Click, Drag, Both }

impl TryFrom<u8> for MoveEvent {
    type Error = String;
    fn try_from(v: u8) -> Result<Self, String> {
        match v {
            0 => Ok(MoveEvent::Click),
            1 => Ok(MoveEvent::Drag),
            2 => Ok(MoveEvent::Both),
            n => Err(format!("moveEvent inválido: {n}")),
        }
    }
}

impl From<MoveEvent> for u8 {
    fn from(m: MoveEvent) -> u8 {
        match m { MoveEvent::Click => 0, MoveEvent::Drag => 1, MoveEvent::Both => 2 }
    }
}

impl MoveEvent {
    pub fn draggable(self) -> bool { !matches!(self, MoveEvent::Click) }
    pub fn selectable(self) -> bool { !matches!(self, MoveEvent::Drag) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Animation {
    pub duration: u32,                                           // Em milissegundos
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PuzzlePrefs {
    pub coords:        Coords,
    pub is3d:          bool,
    pub destination:   bool,                                     // Mostrar destinos legais
    pub rook_castle:   bool,                                     // Roque clicando na torre
    pub move_event:    MoveEvent,
    pub highlight:     bool,                                     // Destacar último lance e xeque
    pub resize_handle: u8,
    pub animation:     Animation,
    pub blindfold:     bool,
}

impl Default for PuzzlePrefs {
    fn default() -> Self {
        Self {
            coords: Coords::Inside,
            is3d: false,
            destination: true,
            rook_castle: true,
            move_event: MoveEvent::Both,
            highlight: true,
            resize_handle: 1,
            animation: Animation { duration: config::DEFAULT_ANIMATION_MS },
            blindfold: false,
        }
    }
}

impl PuzzlePrefs {
    /// Carrega preferências de um arquivo JSON
    pub fn load(path: &Path) -> Result<Self> {
        debug!("carregando preferências de {}", path.display());
        let file = File::open(path).with_context(|| format!("abrir {}", path.display()))?;
        let prefs: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("preferências inválidas em {}", path.display()))?;
        if prefs.resize_handle > 2 {
            bail!("resizeHandle inválido: {}", prefs.resize_handle);
        }
        Ok(prefs)
    }

    /// Carrega do arquivo se informado, senão usa o padrão
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }
}
