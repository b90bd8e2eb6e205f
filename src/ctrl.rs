// src/ctrl.rs
// ---------------------------------------------------------------------------
// Controlador do puzzle: superfície de operações usada pela camada de
// visualização (KeyboardController / Controller) e sua implementação.
// ---------------------------------------------------------------------------

use std::collections::HashMap;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};
use shakmaty::{uci::UciMove, Color, Position, Role, Square};

use crate::{
    ceval::{CevalCtrl, CevalRequest, ClientEval, NodeEvals},
    engine::Engine,
    ground::{make_cg_config, BoardConfig, CgContext, Ground},
    movetest::{move_test, Progress},
    prefs::PuzzlePrefs,
    promotion::Promotion,
    puzzle::{MoveTest, PuzzleData},
    server::PuzzleServer,
    trans::Trans,
    tree::{self, path, Node, NodeMark, TreeWrapper},
    vm::{Feedback, Mode, Vm},
};

/// Pedido de redesenho da interface
pub type Redraw = Box<dyn Fn()>;

/// Fim de partida no nó
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOver { Draw, Checkmate }

/// Operações disparadas pelo teclado
pub trait KeyboardController {
    fn vm(&self) -> &Vm;
    fn redraw(&self);
    fn user_jump(&mut self, path: &str);
    fn get_ceval(&self) -> &CevalCtrl;
    fn toggle_ceval(&mut self);
    fn toggle_threat_mode(&mut self);
    fn play_best_move(&mut self) -> Result<()>;
}

/// Superfície completa que a visualização pode chamar
pub trait Controller: KeyboardController {
    fn next_node_best(&self) -> Option<String>;
    fn disable_threat_mode(&self) -> bool;
    fn game_over(&self, node: Option<&Node>) -> Option<GameOver>;
    fn mandatory_ceval(&self) -> bool;
    fn show_eval_gauge(&self) -> bool;
    fn current_evals(&self) -> NodeEvals;
    fn ongoing(&self) -> bool;
    fn play_uci(&mut self, uci: &str) -> Result<()>;
    fn get_orientation(&self) -> Color;
    fn threat_mode(&self) -> bool;
    fn get_node(&self) -> &Node;
    fn show_computer(&self) -> bool;
    fn trans(&self) -> &Trans;
    fn get_data(&self) -> &PuzzleData;
    fn get_tree(&self) -> &TreeWrapper;
    fn ground(&mut self) -> Option<&mut (dyn Ground + 'static)>;
    fn make_cg_opts(&mut self) -> BoardConfig;
    fn view_solution(&mut self) -> Result<()>;
    fn next_puzzle(&mut self) -> Result<()>;
    fn recent_hash(&self) -> String;
    fn call_to_vote(&self) -> bool;
    fn thanks(&self) -> bool;
    fn vote(&mut self, v: bool) -> Result<()>;
    fn pref(&self) -> &PuzzlePrefs;
    fn user_move(&mut self, orig: Square, dest: Square) -> Result<()>;
    fn promotion(&mut self) -> &mut Promotion;

    fn path(&self) -> &str {
        &self.vm().path
    }

    fn auto_scroll_requested(&self) -> bool {
        self.vm().auto_scroll_requested
    }
}

/// Opções de inicialização do widget
pub struct PuzzleOpts {
    pub pref: PuzzlePrefs,
    pub data: PuzzleData,
    pub i18n: HashMap<String, Option<String>>,
}

pub struct PuzzleCtrl<S: PuzzleServer> {
    data:                PuzzleData,
    tree:                TreeWrapper,
    vm:                  Vm,
    pref:                PuzzlePrefs,
    trans:               Trans,
    ceval:               CevalCtrl,
    server:              S,
    ground:              Option<Box<dyn Ground>>,
    redraw:              Redraw,
    promotion:           Promotion,
    threat_mode:         bool,
    show_eval_gauge:     bool,
    mandatory_ceval:     bool,
    disable_threat_mode: bool,
    ongoing:             bool,
}

/// Árvore e view-model iniciais para um puzzle
fn initial_state(data: &PuzzleData) -> Result<(TreeWrapper, Vm)> {
    data.check()?;
    let tree = TreeWrapper::from_parts(&data.game.tree_parts)?;
    let initial_path = tree.mainline_path();
    let vm = Vm::new(initial_path.clone(), tree.node_list(&initial_path), tree.mainline());
    Ok((tree, vm))
}

impl<S: PuzzleServer> PuzzleCtrl<S> {
    pub fn new(opts: PuzzleOpts, server: S, redraw: Redraw) -> Result<Self> {
        let (tree, vm) = initial_state(&opts.data)?;
        let mut ctrl = Self {
            data: opts.data,
            tree,
            vm,
            pref: opts.pref,
            trans: Trans::new(opts.i18n),
            ceval: CevalCtrl::default(),
            server,
            ground: None,
            redraw,
            promotion: Promotion::default(),
            threat_mode: false,
            show_eval_gauge: true,
            mandatory_ceval: false,
            disable_threat_mode: false,
            ongoing: false,
        };
        ctrl.make_cg_opts();
        info!("puzzle {} carregado ({})", ctrl.data.puzzle.id, crate::puzzle::color_name(ctrl.data.puzzle.color));
        Ok(ctrl)
    }

    /// Liga o componente de tabuleiro e envia a configuração atual
    pub fn set_ground(&mut self, ground: Box<dyn Ground>) {
        self.ground = Some(ground);
        self.refresh_ground();
    }

    /// Exibe ou esconde a barra de avaliação
    pub fn set_show_eval_gauge(&mut self, show: bool) {
        self.show_eval_gauge = show;
    }

    /// Ceval sempre ligado; já liga o motor
    pub fn set_mandatory_ceval(&mut self, mandatory: bool) {
        self.mandatory_ceval = mandatory;
        if mandatory && !self.ceval.enabled() {
            self.ceval.toggle();
            self.start_ceval();
        }
    }

    /// Proíbe o modo ameaça; desliga-o se estiver ativo
    pub fn set_disable_threat_mode(&mut self, disable: bool) {
        self.disable_threat_mode = disable;
        if disable && self.threat_mode {
            self.threat_mode = false;
            self.start_ceval();
        }
    }

    pub fn ceval_mut(&mut self) -> &mut CevalCtrl {
        &mut self.ceval
    }

    /// Libera "ver solução" (a camada de cima decide quando)
    pub fn enable_view_solution(&mut self) {
        if !self.vm.can_view_solution {
            self.vm.can_view_solution = true;
            self.redraw();
        }
    }

    /// Substitui o puzzle atual
    fn load(&mut self, data: PuzzleData) -> Result<()> {
        let (tree, vm) = initial_state(&data)?;
        self.tree = tree;
        self.vm = vm;
        self.data = data;
        self.promotion.cancel();
        self.threat_mode = false;
        self.ceval.stop();
        if let Some(g) = self.ground.as_mut() {
            g.cancel_premove();
        }
        self.refresh_ground();
        info!("puzzle {} carregado", self.data.puzzle.id);
        Ok(())
    }

    fn refresh_ground(&mut self) {
        let config = self.make_cg_opts();
        if let Some(g) = self.ground.as_mut() {
            g.set(&config);
        }
    }

    /// Move o cursor para `path` (ou o maior prefixo existente)
    fn jump(&mut self, to: &str) {
        let list = self.tree.node_list(to);
        let reached: String = list.iter().skip(1).map(|n| n.id.as_str()).collect();
        if reached != to {
            warn!("caminho '{to}' inexistente; parando em '{reached}'");
        }
        self.vm.node = list.last().cloned().unwrap_or_default();
        self.vm.node_list = list;
        self.vm.path = reached;
        self.vm.mainline = self.tree.mainline();
        self.vm.auto_scroll_now = true;
        self.promotion.cancel();
        self.refresh_ground();
        self.start_ceval();
    }

    /// Marca o nó e atualiza as cópias do view-model
    fn mark(&mut self, at: &str, mark: NodeMark) {
        self.tree.update_at(at, |n| n.puzzle = Some(mark));
    }

    /// Marca os nós da solução: "good", e "win" no último
    fn mark_solution(&mut self, initial: &str, end: &str) {
        let ids = path::ids(end);
        let start = path::size(initial);
        for k in start + 1..=ids.len() {
            let at: String = ids[..k].concat();
            let mark = if k == ids.len() { NodeMark::Win } else { NodeMark::Good };
            self.mark(&at, mark);
        }
    }

    fn send_move(&mut self, orig: Square, dest: Square, promotion: Option<Role>) -> Result<()> {
        let test = MoveTest {
            orig,
            dest,
            promotion,
            fen: self.vm.node.fen.clone(),
            path: self.vm.path.clone(),
        };
        self.play_move_test(&test)
    }

    fn play_move_test(&mut self, test: &MoveTest) -> Result<()> {
        let parent = self
            .tree
            .node_at_path(&test.path)
            .ok_or_else(|| anyhow!("caminho inexistente '{}'", test.path))?;
        let node = tree::child_node(parent, &test.uci())?;
        debug!("lance do usuário {}", node.san.as_deref().unwrap_or("?"));
        let new_path = self
            .tree
            .add_node(node, &test.path)
            .ok_or_else(|| anyhow!("caminho inexistente '{}'", test.path))?;
        self.jump(&new_path);
        let progress = move_test(&self.vm, &self.data.puzzle.lines, self.data.puzzle.color);
        self.apply_progress(progress)?;
        self.redraw();
        Ok(())
    }

    fn apply_progress(&mut self, progress: Option<Progress>) -> Result<()> {
        let Some(progress) = progress else { return Ok(()) };
        let at = self.vm.path.clone();
        match progress {
            Progress::Fail => {
                if self.vm.mode == Mode::Play {
                    self.mark(&at, NodeMark::Fail);
                    self.vm.last_feedback = Feedback::Fail;
                    self.vm.can_view_solution = true;
                    self.vm.mode = Mode::Try;
                    self.send_result(false)?;
                } else {
                    self.mark(&at, NodeMark::Retry);
                    self.vm.last_feedback = Feedback::Retry;
                }
                // desfaz o lance errado
                if let Some(g) = self.ground.as_mut() {
                    g.cancel_premove();
                }
                self.jump(&path::init(&at));
            }
            Progress::Win => {
                self.mark(&at, NodeMark::Win);
                if self.vm.mode == Mode::Play {
                    self.send_result(true)?;
                }
                self.vm.last_feedback = Feedback::Win;
                self.vm.mode = Mode::View;
                self.vm.can_view_solution = true;
                self.jump(&at);
            }
            Progress::Good(reply) => {
                self.mark(&at, NodeMark::Good);
                self.vm.last_feedback = Feedback::Good;
                let reply_node = tree::child_node(&self.vm.node, &reply)
                    .with_context(|| format!("resposta '{reply}' das linhas é ilegal"))?;
                let reply_path = self
                    .tree
                    .add_node(reply_node, &at)
                    .ok_or_else(|| anyhow!("caminho inexistente '{at}'"))?;
                self.jump(&reply_path);
            }
        }
        Ok(())
    }

    /// Envia o resultado uma única vez por puzzle
    fn send_result(&mut self, win: bool) -> Result<()> {
        if self.vm.result_sent { return Ok(()); }
        self.vm.result_sent = true;
        let round = self.server.round(self.data.puzzle.id, win)?;
        info!(
            "resultado do puzzle {}: {} ({:+})",
            self.data.puzzle.id,
            if win { "vitória" } else { "derrota" },
            round.round.map_or(0, |r| r.rating_diff)
        );
        self.vm.round = round.round;
        if round.voted.is_some() {
            self.vm.voted = round.voted;
        }
        self.data.user = Some(round.user);
        Ok(())
    }

    fn can_use_ceval(&self) -> bool {
        self.vm.mode == Mode::View && self.game_over(None).is_none()
    }

    fn start_ceval(&mut self) {
        if self.ceval.enabled() && self.can_use_ceval() {
            // sem ameaça com o rei em xeque: o FEN invertido seria ilegal
            let threat = self.threat_mode && !self.vm.node.check;
            self.ceval.start(&self.vm.path, &self.vm.node.fen, threat);
        } else {
            self.ceval.stop();
        }
    }

    /// Conclui a promoção pendente
    pub fn promote(&mut self, role: Role) -> Result<()> {
        match self.promotion.finish(role) {
            Some((orig, dest, role)) => self.send_move(orig, dest, Some(role)),
            None => Ok(()),
        }
    }

    /// Guarda o resultado de uma análise no nó analisado
    pub fn on_ceval(&mut self, req: &CevalRequest, eval: ClientEval) {
        let threat = req.threat;
        let stored = self.tree.update_at(&req.path, |n| {
            if threat { n.threat = Some(eval) } else { n.ceval = Some(eval) }
        });
        if !stored {
            debug!("análise descartada: caminho '{}' não existe mais", req.path);
            return;
        }
        if req.path == self.vm.path {
            if let Some(node) = self.tree.node_at_path(&req.path) {
                self.vm.node = node.clone();
                if let Some(last) = self.vm.node_list.last_mut() {
                    *last = node.clone();
                }
            }
        }
        self.redraw();
    }

    /// Executa o pedido pendente do ceval no motor; false se não havia pedido
    pub async fn run_ceval(&mut self, engine: &mut Engine) -> Result<bool> {
        let Some(req) = self.ceval.take_pending() else { return Ok(false) };
        let eval = engine.run(&req).await?;
        self.on_ceval(&req, eval);
        Ok(true)
    }
}

impl<S: PuzzleServer> KeyboardController for PuzzleCtrl<S> {
    fn vm(&self) -> &Vm {
        &self.vm
    }

    fn redraw(&self) {
        (self.redraw)()
    }

    fn user_jump(&mut self, to: &str) {
        if let Some(g) = self.ground.as_mut() {
            g.select_square(None);
        }
        self.jump(to);
        self.redraw();
    }

    fn get_ceval(&self) -> &CevalCtrl {
        &self.ceval
    }

    fn toggle_ceval(&mut self) {
        if self.mandatory_ceval && self.ceval.enabled() { return; }
        self.ceval.toggle();
        self.start_ceval();
        if !self.ceval.enabled() {
            self.threat_mode = false;
        }
        self.redraw();
    }

    fn toggle_threat_mode(&mut self) {
        if self.vm.node.check || self.disable_threat_mode { return; }
        if !self.ceval.enabled() {
            self.ceval.toggle();
        }
        self.threat_mode = !self.threat_mode;
        self.start_ceval();
        self.redraw();
    }

    fn play_best_move(&mut self) -> Result<()> {
        let best = self
            .next_node_best()
            .or_else(|| self.vm.node.ceval.as_ref().and_then(|c| c.best().map(String::from)));
        match best {
            Some(uci) => self.play_uci(&uci),
            None => Ok(()),
        }
    }
}

impl<S: PuzzleServer> Controller for PuzzleCtrl<S> {
    fn next_node_best(&self) -> Option<String> {
        self.vm.node.children.first()?.eval.as_ref()?.best.clone()
    }

    fn disable_threat_mode(&self) -> bool {
        self.disable_threat_mode
    }

    fn game_over(&self, node: Option<&Node>) -> Option<GameOver> {
        let node = node.unwrap_or(&self.vm.node);
        let pos = tree::parse_position(&node.fen).ok()?;
        if pos.is_checkmate() {
            Some(GameOver::Checkmate)
        } else if pos.is_stalemate() || pos.is_insufficient_material() {
            Some(GameOver::Draw)
        } else {
            None
        }
    }

    fn mandatory_ceval(&self) -> bool {
        self.mandatory_ceval
    }

    fn show_eval_gauge(&self) -> bool {
        self.show_eval_gauge
    }

    fn current_evals(&self) -> NodeEvals {
        NodeEvals { client: self.vm.node.ceval.clone(), server: self.vm.node.eval.clone() }
    }

    fn ongoing(&self) -> bool {
        self.ongoing
    }

    fn play_uci(&mut self, uci: &str) -> Result<()> {
        match uci.parse::<UciMove>() {
            Ok(UciMove::Normal { from, to, promotion }) => self.send_move(from, to, promotion),
            _ => bail!("lance uci inválido: '{uci}'"),
        }
    }

    fn get_orientation(&self) -> Color {
        self.data.puzzle.color
    }

    fn threat_mode(&self) -> bool {
        self.threat_mode
    }

    fn get_node(&self) -> &Node {
        &self.vm.node
    }

    fn show_computer(&self) -> bool {
        self.vm.show_computer()
    }

    fn trans(&self) -> &Trans {
        &self.trans
    }

    fn get_data(&self) -> &PuzzleData {
        &self.data
    }

    fn get_tree(&self) -> &TreeWrapper {
        &self.tree
    }

    fn ground(&mut self) -> Option<&mut (dyn Ground + 'static)> {
        self.ground.as_deref_mut()
    }

    fn make_cg_opts(&mut self) -> BoardConfig {
        let config = make_cg_config(&CgContext {
            node: &self.vm.node,
            puzzle_color: self.data.puzzle.color,
            mode: self.vm.mode,
            initial_ply: self.vm.initial_node.ply,
            prefs: &self.pref,
        });
        self.vm.cg_config = config.clone();
        config
    }

    fn view_solution(&mut self) -> Result<()> {
        if !self.vm.can_view_solution { return Ok(()); }
        self.send_result(false)?;
        self.vm.mode = Mode::View;
        let initial = self.vm.initial_path.clone();
        let end = match self.data.puzzle.branch.clone() {
            Some(branch) => self
                .tree
                .merge_solution(&initial, &branch)
                .ok_or_else(|| anyhow!("caminho inicial '{initial}' inexistente"))?,
            None => {
                let ucis = self.data.puzzle.lines.solution();
                self.tree.add_ucis(&ucis, &initial)?
            }
        };
        // a solução vira a linha principal, à frente das tentativas do usuário
        self.tree.promote_to_mainline(&end);
        self.mark_solution(&initial, &end);
        // avança um lance na solução a partir da posição atual
        let from = if path::contains(&end, &self.vm.path) { self.vm.path.clone() } else { initial };
        let next = path::ids(&end).into_iter().nth(path::size(&from)).unwrap_or_default();
        info!("solução do puzzle {} exibida", self.data.puzzle.id);
        self.user_jump(&format!("{from}{next}"));
        Ok(())
    }

    fn next_puzzle(&mut self) -> Result<()> {
        self.ceval.stop();
        self.vm.loading = true;
        self.redraw();
        let loaded = match self.server.next_puzzle() {
            Ok(data) => self.load(data),
            Err(e) => Err(e),
        };
        self.vm.loading = false;
        self.redraw();
        loaded
    }

    fn recent_hash(&self) -> String {
        let recent: String = self
            .data
            .user
            .as_ref()
            .map(|u| u.recent.iter().map(|r| r.puzzle_id().to_string()).collect())
            .unwrap_or_default();
        format!("ph{}{}", self.data.puzzle.id, recent)
    }

    fn call_to_vote(&self) -> bool {
        self.data.puzzle.enabled && self.data.voted == Some(None) && self.vm.voted.is_none()
    }

    fn thanks(&self) -> bool {
        self.vm.voted.is_some()
    }

    fn vote(&mut self, v: bool) -> Result<()> {
        if !self.data.puzzle.enabled {
            warn!("voto ignorado: puzzle {} desativado", self.data.puzzle.id);
            return Ok(());
        }
        let res = self.server.vote(self.data.puzzle.id, v)?;
        self.data.voted = Some(Some(res.up()));
        self.data.puzzle.vote = res.score();
        self.vm.voted = Some(res.up());
        debug!("voto registrado: {} → {}", res.up(), res.score());
        self.redraw();
        Ok(())
    }

    fn pref(&self) -> &PuzzlePrefs {
        &self.pref
    }

    fn user_move(&mut self, orig: Square, dest: Square) -> Result<()> {
        self.vm.just_played = Some(orig);
        if self.promotion.start(&self.vm.node.fen, orig, dest) {
            self.redraw();
            return Ok(());
        }
        self.send_move(orig, dest, None)
    }

    fn promotion(&mut self) -> &mut Promotion {
        &mut self.promotion
    }
}
