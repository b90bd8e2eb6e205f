// src/tree.rs
// ---------------------------------------------------------------------------
// Árvore de lances do puzzle: nós, caminhos (ids de 2 caracteres) e
// construção a partir de treeParts ou de um PGN.
// ---------------------------------------------------------------------------

use std::io::Cursor;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, trace};
use pgn_reader::{BufferedReader, RawHeader, SanPlus, Skip, Visitor};
use serde::{Deserialize, Serialize};
use shakmaty::{
    fen::Fen, uci::UciMove, CastlingMode, Chess, Color, EnPassantMode, Move, Position, Role, Square,
};

use crate::ceval::{ClientEval, ServerEval};

/// Caminho na árvore: concatenação dos ids dos nós a partir da raiz
pub type Path = String;

/// Marca deixada num nó pelo teste de lance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeMark { Good, Fail, Win, Retry }

/// Nó da árvore (Tree.Node)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id:  String,                                              // 2 caracteres; vazio na raiz
    pub ply: u32,                                                 // Meio-lances desde o início da partida
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uci: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub san: Option<String>,
    pub fen: String,
    #[serde(default)]
    pub children: Vec<Node>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub check: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ceval: Option<ClientEval>,                                // Avaliação local
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval: Option<ServerEval>,                                 // Avaliação do servidor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat: Option<ClientEval>,                               // Avaliação no modo ameaça
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub puzzle: Option<NodeMark>,
}

impl Node {
    /// Cor que jogou o lance que levou a este nó
    pub fn played_by(&self) -> Color {
        if self.ply % 2 == 1 { Color::White } else { Color::Black }
    }

    /// Cor que joga a partir deste nó
    pub fn turn(&self) -> Color {
        !self.played_by()
    }

    pub fn is_castle(&self) -> bool {
        self.san.as_deref().map_or(false, |s| s.starts_with("O-O"))
    }
}

// ---------------------------------------------------------------------------
// Operações sobre caminhos
// ---------------------------------------------------------------------------
pub mod path {
    use super::Path;

    /// Ids podem ser caracteres não-ASCII, então tudo opera sobre chars
    fn chars(p: &str) -> Vec<char> { p.chars().collect() }

    pub fn root() -> Path { Path::new() }

    pub fn size(p: &str) -> usize { p.chars().count() / 2 }

    pub fn head(p: &str) -> Path { p.chars().take(2).collect() }

    pub fn tail(p: &str) -> Path { p.chars().skip(2).collect() }

    pub fn init(p: &str) -> Path {
        let c = chars(p);
        c[..c.len().saturating_sub(2)].iter().collect()
    }

    pub fn last(p: &str) -> Path {
        let c = chars(p);
        c[c.len().saturating_sub(2)..].iter().collect()
    }

    pub fn contains(p: &str, sub: &str) -> bool { p.starts_with(sub) }

    pub fn ids(p: &str) -> Vec<String> {
        chars(p).chunks(2).map(|c| c.iter().collect()).collect()
    }
}

// ---------------------------------------------------------------------------
// Ids de nós: par de caracteres derivado do lance uci
// ---------------------------------------------------------------------------
const PROMOTION_ORDER: [Role; 5] = [Role::Queen, Role::Rook, Role::Bishop, Role::Knight, Role::King];

fn square_char(sq: Square) -> char {
    char::from_u32(35 + u32::from(sq)).unwrap_or('#')
}

fn promotion_char(to: Square, role: Role) -> char {
    let idx = PROMOTION_ORDER.iter().position(|r| *r == role).unwrap_or(0) as u32;
    char::from_u32(35 + 64 + 8 * idx + u32::from(to.file())).unwrap_or('#')
}

fn drop_char(role: Role) -> char {
    let idx = [Role::Queen, Role::Rook, Role::Bishop, Role::Knight, Role::Pawn]
        .iter()
        .position(|r| *r == role)
        .unwrap_or(0) as u32;
    char::from_u32(35 + 64 + 8 * 5 + idx).unwrap_or('#')
}

/// Id de 2 caracteres de um lance
pub fn char_pair(uci: &UciMove) -> String {
    match uci {
        UciMove::Normal { from, to, promotion } => {
            let second = match promotion {
                Some(role) => promotion_char(*to, *role),
                None => square_char(*to),
            };
            [square_char(*from), second].iter().collect()
        }
        UciMove::Put { role, to } => [drop_char(*role), square_char(*to)].iter().collect(),
        UciMove::Null => "##".into(),
    }
}

// ---------------------------------------------------------------------------
// Posições e criação de nós
// ---------------------------------------------------------------------------
/// Interpreta um FEN como posição de xadrez padrão
pub fn parse_position(fen: &str) -> Result<Chess> {
    let parsed: Fen = fen.parse().map_err(|e| anyhow!("FEN inválido '{fen}': {e}"))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| anyhow!("posição ilegal '{fen}': {e}"))
}

fn fen_of(pos: &Chess) -> String {
    Fen::from_position(pos.clone(), EnPassantMode::Legal).to_string()
}

/// Nó raiz para um FEN (ou posição inicial), com ply coerente com o FEN
pub fn root_node(fen: Option<&str>) -> Result<Node> {
    let pos = match fen {
        Some(f) => parse_position(f)?,
        None => Chess::default(),
    };
    let ply = (pos.fullmoves().get() - 1)
        .checked_mul(2)
        .and_then(|p| p.checked_add(u32::from(pos.turn() == Color::Black)))
        .ok_or_else(|| anyhow!("contador de lances grande demais em '{}'", fen.unwrap_or_default()))?;
    Ok(Node { ply, fen: fen_of(&pos), check: pos.is_check(), ..Node::default() })
}

/// Aplica `mv` (legal em `pos`) e devolve o nó filho correspondente
pub fn node_after(parent_ply: u32, pos: &mut Chess, mv: &Move) -> Node {
    let uci = UciMove::from_move(mv, CastlingMode::Standard);
    let san = SanPlus::from_move_and_play_unchecked(pos, mv);
    Node {
        id:    char_pair(&uci),
        ply:   parent_ply.saturating_add(1),
        uci:   Some(uci.to_string()),
        san:   Some(san.to_string()),
        fen:   fen_of(pos),
        check: pos.is_check(),
        ..Node::default()
    }
}

/// Cria o nó filho de `parent` para o lance uci, validando a legalidade
pub fn child_node(parent: &Node, uci: &str) -> Result<Node> {
    let mut pos = parse_position(&parent.fen)?;
    let parsed: UciMove = uci.parse().map_err(|e| anyhow!("uci inválido '{uci}': {e}"))?;
    let mv = parsed
        .to_move(&pos)
        .map_err(|e| anyhow!("lance ilegal '{uci}' em {}: {e}", parent.fen))?;
    Ok(node_after(parent.ply, &mut pos, &mv))
}

// ---------------------------------------------------------------------------
// TreeWrapper
// ---------------------------------------------------------------------------
/// Árvore de lances com navegação por caminho
#[derive(Debug, Clone, PartialEq)]
pub struct TreeWrapper {
    root: Node,
}

impl TreeWrapper {
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    /// Encadeia a lista plana treeParts: cada nó é o primeiro filho do anterior
    pub fn from_parts(parts: &[Node]) -> Result<Self> {
        let mut rev = parts.iter().rev();
        let Some(last) = rev.next() else { bail!("treeParts vazio") };
        let mut node = last.clone();
        for parent in rev {
            let mut p = parent.clone();
            p.children.retain(|c| c.id != node.id);
            p.children.insert(0, node);
            node = p;
        }
        debug!("árvore construída com {} nós na linha principal", parts.len());
        Ok(Self { root: node })
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn node_at_path(&self, path: &str) -> Option<&Node> {
        let mut node = &self.root;
        for id in path::ids(path) {
            node = node.children.iter().find(|c| c.id == id)?;
        }
        Some(node)
    }

    fn node_at_path_mut(&mut self, path: &str) -> Option<&mut Node> {
        let mut node = &mut self.root;
        for id in path::ids(path) {
            node = node.children.iter_mut().find(|c| c.id == id)?;
        }
        Some(node)
    }

    /// Nós da raiz até o fim do caminho (inclusive); para no primeiro id desconhecido
    pub fn node_list(&self, path: &str) -> Vec<Node> {
        let mut out = vec![self.root.clone()];
        let mut node = &self.root;
        for id in path::ids(path) {
            match node.children.iter().find(|c| c.id == id) {
                Some(child) => { out.push(child.clone()); node = child; }
                None => break,
            }
        }
        out
    }

    pub fn path_is_mainline(&self, path: &str) -> bool {
        let mut node = &self.root;
        for id in path::ids(path) {
            match node.children.first() {
                Some(child) if child.id == id => node = child,
                _ => return false,
            }
        }
        true
    }

    pub fn mainline(&self) -> Vec<Node> {
        let mut out = vec![self.root.clone()];
        let mut node = &self.root;
        while let Some(child) = node.children.first() {
            out.push(child.clone());
            node = child;
        }
        out
    }

    /// Caminho até o último nó da linha principal
    pub fn mainline_path(&self) -> Path {
        self.mainline().iter().skip(1).map(|n| n.id.as_str()).collect()
    }

    /// Acrescenta um filho; se já existe um filho com o mesmo id, reaproveita
    pub fn add_node(&mut self, node: Node, path: &str) -> Option<Path> {
        let parent = self.node_at_path_mut(path)?;
        let new_path = format!("{path}{}", node.id);
        if !parent.children.iter().any(|c| c.id == node.id) {
            trace!("novo nó {} em '{}'", node.uci.as_deref().unwrap_or("?"), path);
            parent.children.push(node);
        }
        Some(new_path)
    }

    /// Acrescenta uma sequência de nós, cada um filho do anterior
    pub fn add_nodes(&mut self, nodes: Vec<Node>, path: &str) -> Option<Path> {
        nodes.into_iter().try_fold(path.to_string(), |p, n| self.add_node(n, &p))
    }

    pub fn update_at<F: FnOnce(&mut Node)>(&mut self, path: &str, f: F) -> bool {
        match self.node_at_path_mut(path) {
            Some(node) => { f(node); true }
            None => false,
        }
    }

    /// Insere o ramo da solução (encadeado por children[0]) sob o caminho inicial
    pub fn merge_solution(&mut self, initial_path: &str, branch: &Node) -> Option<Path> {
        let mut chain = Vec::new();
        let mut cur = Some(branch);
        while let Some(n) = cur {
            let mut flat = n.clone();
            flat.children.clear();
            chain.push(flat);
            cur = n.children.first();
        }
        self.add_nodes(chain, initial_path)
    }

    /// Leva o caminho para a linha principal: cada nó passa a ser o primeiro filho
    pub fn promote_to_mainline(&mut self, path: &str) -> bool {
        let mut node = &mut self.root;
        for id in path::ids(path) {
            let Some(i) = node.children.iter().position(|c| c.id == id) else { return false };
            let child = node.children.remove(i);
            node.children.insert(0, child);
            node = &mut node.children[0];
        }
        true
    }

    /// Constrói e insere a sequência uci a partir do caminho dado
    pub fn add_ucis(&mut self, ucis: &[String], path: &str) -> Result<Path> {
        let mut cur = path.to_string();
        for uci in ucis {
            let parent = self.node_at_path(&cur).ok_or_else(|| anyhow!("caminho inexistente '{cur}'"))?;
            let node = child_node(parent, uci)?;
            cur = self.add_node(node, &cur).ok_or_else(|| anyhow!("caminho inexistente '{cur}'"))?;
        }
        Ok(cur)
    }
}

// ---------------------------------------------------------------------------
// Importação de PGN → treeParts
// ---------------------------------------------------------------------------
/// Constrói treeParts (linha principal) a partir da primeira partida do PGN
pub fn parts_from_pgn(pgn: &str) -> Result<Vec<Node>> {
    // Visitor que guarda o FEN inicial e os lances da linha principal
    struct Collector { fen: Option<String>, sans: Vec<SanPlus> }

    impl Visitor for Collector {
        type Result = ();
        fn header(&mut self, key: &[u8], value: RawHeader<'_>) {
            if key.eq_ignore_ascii_case(b"fen") {
                if let Ok(v) = std::str::from_utf8(value.as_bytes()) {
                    self.fen = Some(v.trim_matches('"').to_string());
                }
            }
        }
        fn san(&mut self, sp: SanPlus) { self.sans.push(sp); }
        fn begin_variation(&mut self) -> Skip { Skip(true) }
        fn end_game(&mut self) -> Self::Result {}
    }

    let mut reader = BufferedReader::new(Cursor::new(pgn.as_bytes()));
    let mut col = Collector { fen: None, sans: Vec::new() };
    if reader.read_game(&mut col).context("ler PGN")?.is_none() {
        bail!("nenhuma partida no PGN");
    }

    let root = root_node(col.fen.as_deref())?;
    let mut pos = parse_position(&root.fen)?;
    let mut parts = vec![root];
    for sp in &col.sans {
        let mv = sp.san.to_move(&pos).map_err(|e| anyhow!("lance '{}' inválido: {e}", sp))?;
        let ply = parts.last().map_or(0, |n| n.ply);
        parts.push(node_after(ply, &mut pos, &mv));
    }
    debug!("PGN importado: {} lances", col.sans.len());
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    fn chain(ucis: &[&str]) -> Vec<Node> {
        let mut parts = vec![root_node(None).unwrap()];
        for uci in ucis {
            let next = child_node(parts.last().unwrap(), uci).unwrap();
            parts.push(next);
        }
        parts
    }

    #[test]
    fn ids_follow_char_pair_encoding() {
        let root = root_node(Some(START)).unwrap();
        let e4 = child_node(&root, "e2e4").unwrap();
        assert_eq!(e4.id, "/?");
        assert_eq!(e4.san.as_deref(), Some("e4"));
        assert_eq!(e4.ply, 1);
        assert_eq!(e4.played_by(), Color::White);
        assert!(!e4.check);
    }

    #[test]
    fn promotion_ids_use_extended_chars() {
        let root = root_node(Some("8/P7/8/8/8/8/8/k6K w - - 0 1")).unwrap();
        let queen = child_node(&root, "a7a8q").unwrap();
        let knight = child_node(&root, "a7a8n").unwrap();
        assert_ne!(queen.id, knight.id);
        assert_eq!(path::size(&queen.id), 1);
        assert_eq!(queen.san.as_deref(), Some("a8=Q+"));
        assert!(queen.check);
    }

    #[test]
    fn rejects_illegal_moves() {
        let root = root_node(None).unwrap();
        assert!(child_node(&root, "e2e5").is_err());
        assert!(child_node(&root, "zz").is_err());
    }

    #[test]
    fn root_ply_follows_fen() {
        let root = root_node(Some("4k3/8/8/8/8/8/8/4K3 b - - 0 10")).unwrap();
        assert_eq!(root.ply, 19);
        assert_eq!(root.turn(), Color::Black);
    }

    #[test]
    fn path_ops_work_on_chars() {
        let p = format!("/?{}", "\u{8a}#");
        assert_eq!(path::size(&p), 2);
        assert_eq!(path::head(&p), "/?");
        assert_eq!(path::tail(&p), "\u{8a}#");
        assert_eq!(path::init(&p), "/?");
        assert_eq!(path::last(&p), "\u{8a}#");
        assert!(path::contains(&p, "/?"));
        assert_eq!(path::init(""), "");
    }

    #[test]
    fn builds_mainline_from_parts() {
        let parts = chain(&["e2e4", "e7e5", "g1f3"]);
        let tree = TreeWrapper::from_parts(&parts).unwrap();
        let end = tree.mainline_path();
        assert_eq!(path::size(&end), 3);
        assert_eq!(tree.node_at_path(&end).unwrap().san.as_deref(), Some("Nf3"));
        assert_eq!(tree.node_list(&end).len(), 4);
        assert!(tree.path_is_mainline(&end));
        assert!(TreeWrapper::from_parts(&[]).is_err());
    }

    #[test]
    fn add_node_reuses_existing_children() {
        let parts = chain(&["e2e4"]);
        let mut tree = TreeWrapper::from_parts(&parts).unwrap();
        let d4 = child_node(tree.root(), "d2d4").unwrap();
        let p1 = tree.add_node(d4.clone(), "").unwrap();
        let p2 = tree.add_node(d4, "").unwrap();
        assert_eq!(p1, p2);
        assert_eq!(tree.root().children.len(), 2);
        assert!(!tree.path_is_mainline(&p1));
        assert!(tree.add_node(Node::default(), "zz").is_none());
    }

    #[test]
    fn castling_nodes_are_marked() {
        let mut tree = TreeWrapper::new(root_node(Some("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1")).unwrap());
        let p = tree.add_ucis(&["e1g1".to_string()], "").unwrap();
        let node = tree.node_at_path(&p).unwrap();
        assert!(node.is_castle());
        assert_eq!(node.uci.as_deref(), Some("e1g1"));
    }

    #[test]
    fn merges_solution_branch() {
        let parts = chain(&["e2e4"]);
        let mut tree = TreeWrapper::from_parts(&parts).unwrap();
        let initial = tree.mainline_path();
        let mut e5 = child_node(tree.node_at_path(&initial).unwrap(), "e7e5").unwrap();
        let nf3 = child_node(&e5, "g1f3").unwrap();
        e5.children.push(nf3);
        let end = tree.merge_solution(&initial, &e5).unwrap();
        assert_eq!(path::size(&end), 3);
        assert!(tree.path_is_mainline(&end));
    }

    #[test]
    fn promotes_a_variation_to_mainline() {
        let parts = chain(&["e2e4"]);
        let mut tree = TreeWrapper::from_parts(&parts).unwrap();
        let initial = tree.mainline_path();
        tree.add_ucis(&["c7c5".to_string(), "g1f3".to_string()], &initial).unwrap();
        let end = tree.add_ucis(&["e7e5".to_string(), "g1f3".to_string()], &initial).unwrap();
        assert!(!tree.path_is_mainline(&end));

        assert!(tree.promote_to_mainline(&end));
        assert!(tree.path_is_mainline(&end));
        assert_eq!(tree.mainline().last().unwrap().fen, tree.node_at_path(&end).unwrap().fen);
        assert_eq!(tree.node_at_path(&initial).unwrap().children.len(), 2);
        assert!(!tree.promote_to_mainline("zz"));
    }

    #[test]
    fn huge_move_counter_is_rejected() {
        assert!(root_node(Some("4k3/8/8/8/8/8/8/4K3 b - - 0 4294967295")).is_err());
    }

    #[test]
    fn imports_pgn_with_fen_header() {
        let pgn = "[FEN \"4k3/8/8/8/8/8/4P3/4K3 w - - 0 1\"]\n\n1. e4 Kd7 2. Kd2 *\n";
        let parts = parts_from_pgn(pgn).unwrap();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0].ply, 0);
        assert_eq!(parts[3].san.as_deref(), Some("Kd2"));

        let plain = parts_from_pgn("1. e4 e5 (1... c5) 2. Nf3 *\n").unwrap();
        assert_eq!(plain.len(), 4);
    }
}
