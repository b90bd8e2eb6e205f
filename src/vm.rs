// src/vm.rs
// Estado transitório da interface (view-model)

use serde::{Deserialize, Serialize};
use shakmaty::Square;

use crate::{
    ground::BoardConfig,
    puzzle::RoundResult,
    tree::{Node, Path},
};

/// Modo de interação
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Play,                                                        // Resolvendo, resultado ainda não enviado
    View,                                                        // Puzzle encerrado: navegação livre
    Try,                                                         // Após um erro: novas tentativas sem efeito no rating
}

/// Última classificação mostrada ao usuário
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback { Init, Fail, Win, Good, Retry }

#[derive(Debug, Clone)]
pub struct Vm {
    pub path:                  Path,
    pub node_list:             Vec<Node>,
    pub node:                  Node,
    pub mainline:              Vec<Node>,
    pub mode:                  Mode,
    pub loading:               bool,
    pub round:                 Option<RoundResult>,
    pub voted:                 Option<bool>,
    pub just_played:           Option<Square>,
    pub result_sent:           bool,
    pub last_feedback:         Feedback,
    pub initial_path:          Path,
    pub initial_node:          Node,
    pub can_view_solution:     bool,
    pub auto_scroll_requested: bool,
    pub auto_scroll_now:       bool,
    pub cg_config:             BoardConfig,
}

impl Vm {
    /// Estado de partida na posição inicial do puzzle
    pub fn new(initial_path: Path, node_list: Vec<Node>, mainline: Vec<Node>) -> Self {
        let node = node_list.last().cloned().unwrap_or_default();
        Self {
            path: initial_path.clone(),
            node_list,
            node: node.clone(),
            mainline,
            mode: Mode::Play,
            loading: false,
            round: None,
            voted: None,
            just_played: None,
            result_sent: false,
            last_feedback: Feedback::Init,
            initial_path,
            initial_node: node,
            can_view_solution: false,
            auto_scroll_requested: false,
            auto_scroll_now: false,
            cg_config: BoardConfig::default(),
        }
    }

    /// Análise do computador só é exibida com o puzzle encerrado
    pub fn show_computer(&self) -> bool {
        self.mode == Mode::View
    }

    pub fn show_auto_shapes(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_in_play_mode_at_initial_node() {
        let nodes = vec![Node { ply: 0, ..Node::default() }, Node { id: "/?".into(), ply: 1, ..Node::default() }];
        let vm = Vm::new("/?".into(), nodes.clone(), nodes);
        assert_eq!(vm.mode, Mode::Play);
        assert_eq!(vm.last_feedback, Feedback::Init);
        assert_eq!(vm.node.ply, 1);
        assert_eq!(vm.initial_node, vm.node);
        assert!(!vm.show_computer());
    }

    #[test]
    fn feedback_names_match_web_layer() {
        assert_eq!(serde_json::to_string(&Feedback::Retry).unwrap(), "\"retry\"");
        assert_eq!(serde_json::to_string(&Mode::Try).unwrap(), "\"try\"");
    }
}
