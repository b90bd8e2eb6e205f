// src/movetest.rs
// ---------------------------------------------------------------------------
// Teste do lance do usuário contra as linhas do puzzle
// ---------------------------------------------------------------------------

use log::trace;
use shakmaty::Color;

use crate::{
    lines::{Lines, PlayedMove},
    tree::path,
    vm::{Mode, Vm},
};

/// Resultado do teste de um lance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Fail,
    Win,
    Good(String),                                                // Resposta do oponente, em uci
}

/// Lances jogados depois da posição inicial do puzzle
pub fn played_since_initial(vm: &Vm) -> Vec<PlayedMove> {
    vm.node_list
        .iter()
        .skip(path::size(&vm.initial_path) + 1)
        .filter_map(|n| n.uci.as_ref().map(|u| PlayedMove::new(u.clone(), n.is_castle())))
        .collect()
}

/// Testa o último lance do caminho atual.
///
/// Devolve `None` quando não há o que testar: modo de visualização, caminho
/// fora da linha do puzzle ou último lance jogado pelo oponente.
pub fn move_test(vm: &Vm, lines: &Lines, color: Color) -> Option<Progress> {
    if vm.mode == Mode::View { return None; }
    if !path::contains(&vm.path, &vm.initial_path) { return None; }
    if vm.node.played_by() != color { return None; }

    let played = played_since_initial(vm);
    let progress = match lines.follow(&played) {
        None | Some(Lines::Fail) => Progress::Fail,
        Some(Lines::Win) => Progress::Win,
        Some(next) => match next.first_branch() {
            Some((_, Lines::Win)) => Progress::Win,
            Some((uci, _)) => Progress::Good(uci.to_string()),
            None => Progress::Fail,
        },
    };
    trace!("teste de lance após {} lances: {:?}", played.len(), progress);
    Some(progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{child_node, root_node, TreeWrapper};

    fn lines() -> Lines {
        serde_json::from_str(r#"{
            "e7e5": { "g1f3": { "b8c6": "win" } },
            "c7c5": "fail"
        }"#)
        .unwrap()
    }

    /// Vm após 1.e4 seguido dos lances dados
    fn vm_after(ucis: &[&str], mode: Mode) -> Vm {
        let root = root_node(None).unwrap();
        let e4 = child_node(&root, "e2e4").unwrap();
        let mut tree = TreeWrapper::from_parts(&[root, e4]).unwrap();
        let initial = tree.mainline_path();
        let owned: Vec<String> = ucis.iter().map(|s| s.to_string()).collect();
        let end = tree.add_ucis(&owned, &initial).unwrap();
        let mut vm = Vm::new(initial, tree.node_list(&end), tree.mainline());
        vm.path = end.clone();
        vm.node = tree.node_at_path(&end).unwrap().clone();
        vm.mode = mode;
        vm
    }

    #[test]
    fn expected_move_is_good() {
        let vm = vm_after(&["e7e5"], Mode::Play);
        assert_eq!(move_test(&vm, &lines(), Color::Black), Some(Progress::Good("g1f3".into())));
    }

    #[test]
    fn completing_the_line_wins() {
        let vm = vm_after(&["e7e5", "g1f3", "b8c6"], Mode::Play);
        assert_eq!(move_test(&vm, &lines(), Color::Black), Some(Progress::Win));
    }

    #[test]
    fn wrong_or_unknown_moves_fail() {
        let vm = vm_after(&["c7c5"], Mode::Try);
        assert_eq!(move_test(&vm, &lines(), Color::Black), Some(Progress::Fail));
        let vm = vm_after(&["d7d5"], Mode::Play);
        assert_eq!(move_test(&vm, &lines(), Color::Black), Some(Progress::Fail));
    }

    #[test]
    fn nothing_to_test() {
        assert_eq!(move_test(&vm_after(&["e7e5"], Mode::View), &lines(), Color::Black), None);
        assert_eq!(move_test(&vm_after(&["e7e5", "g1f3"], Mode::Play), &lines(), Color::Black), None);

        let mut outside = vm_after(&["e7e5"], Mode::Play);
        outside.path = String::new();
        assert_eq!(move_test(&outside, &lines(), Color::Black), None);
    }
}
