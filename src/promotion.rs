// src/promotion.rs
// Escolha da peça de promoção: lance pendente até o usuário escolher

use log::debug;
use shakmaty::{Position, Role, Square};

use crate::{config, tree};

/// Dados para o seletor de promoção
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionView {
    pub orig:  Square,
    pub dest:  Square,
    pub roles: [Role; 4],
}

#[derive(Debug, Clone, Default)]
pub struct Promotion {
    pending: Option<(Square, Square)>,
}

impl Promotion {
    /// Abre o seletor se o lance é uma promoção legal; devolve true nesse caso
    pub fn start(&mut self, fen: &str, orig: Square, dest: Square) -> bool {
        let Ok(pos) = tree::parse_position(fen) else { return false };
        let is_promotion = pos
            .legal_moves()
            .iter()
            .any(|m| m.from() == Some(orig) && m.to() == dest && m.promotion().is_some());
        if is_promotion {
            debug!("promoção pendente {orig}{dest}");
            self.pending = Some((orig, dest));
        }
        is_promotion
    }

    /// Conclui a promoção pendente com a peça escolhida
    pub fn finish(&mut self, role: Role) -> Option<(Square, Square, Role)> {
        if !config::PROMOTION_ROLES.contains(&role) { return None; }
        self.pending.take().map(|(o, d)| (o, d, role))
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn view(&self) -> Option<PromotionView> {
        self.pending.map(|(orig, dest)| PromotionView { orig, dest, roles: config::PROMOTION_ROLES })
    }
}
