//! The node table and the default Helios sales script.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::FlowError;
use crate::lead::LeadField;

use super::node::{DialogNode, DialogOption, ExtractorKind, NodeId, NodeKind};

/// Industry key used when the visitor describes their own business.
pub const OTHER_INDUSTRY: &str = "other";

/// Validated, immutable graph of dialog nodes.
#[derive(Debug, Clone)]
pub struct NodeTable {
    start: NodeId,
    main_menu: NodeId,
    nodes: HashMap<NodeId, DialogNode>,
    pitches: HashMap<String, String>,
}

impl NodeTable {
    /// Build and validate a table.
    ///
    /// Every referenced node must exist, every node must be reachable from
    /// `start`, and every node must be able to reach an `End` node (loops
    /// back through the main menu qualify, since the menu itself must).
    pub fn new(
        start: NodeId,
        main_menu: NodeId,
        nodes: Vec<DialogNode>,
        pitches: HashMap<String, String>,
    ) -> Result<Self, FlowError> {
        let nodes: HashMap<NodeId, DialogNode> = nodes.into_iter().map(|n| (n.id, n)).collect();
        let table = Self {
            start,
            main_menu,
            nodes,
            pitches,
        };
        table.validate()?;
        Ok(table)
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn main_menu(&self) -> NodeId {
        self.main_menu
    }

    pub fn get(&self, id: NodeId) -> Result<&DialogNode, FlowError> {
        self.nodes.get(&id).ok_or(FlowError::UnknownNode(id))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sales copy for an industry key.
    pub fn pitch_for(&self, industry: &str) -> Result<&str, FlowError> {
        self.pitches
            .get(industry)
            .map(String::as_str)
            .ok_or_else(|| FlowError::MissingPitch(industry.to_string()))
    }

    fn validate(&self) -> Result<(), FlowError> {
        for id in [self.start, self.main_menu] {
            self.get(id)?;
        }

        for node in self.nodes.values() {
            for target in node.targets() {
                if !self.nodes.contains_key(&target) {
                    return Err(FlowError::DanglingTransition {
                        node: node.id,
                        target,
                    });
                }
            }
        }

        // Forward reachability from the start node.
        let mut reachable = HashSet::from([self.start]);
        let mut queue = VecDeque::from([self.start]);
        while let Some(id) = queue.pop_front() {
            for target in self.nodes[&id].targets() {
                if reachable.insert(target) {
                    queue.push_back(target);
                }
            }
        }
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_by_key(|id| id.to_string());
        if let Some(orphan) = ids.iter().find(|id| !reachable.contains(id)) {
            return Err(FlowError::Unreachable(*orphan));
        }

        // Backward reachability from the exits. Sequence steps are only
        // narrated, so they do not count as a way out.
        let mut incoming: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for node in self.nodes.values() {
            let exits = match &node.kind {
                NodeKind::Sequence { then, .. } => vec![*then],
                _ => node.targets(),
            };
            for target in exits {
                incoming.entry(target).or_default().push(node.id);
            }
        }
        let mut exits: HashSet<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.is_terminal())
            .map(|n| n.id)
            .collect();
        if exits.is_empty() {
            return Err(FlowError::NoExit(self.main_menu));
        }
        let mut queue: VecDeque<NodeId> = exits.iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            for source in incoming.get(&id).into_iter().flatten() {
                if exits.insert(*source) {
                    queue.push_back(*source);
                }
            }
        }
        if let Some(stuck) = ids.iter().find(|id| !exits.contains(id)) {
            return Err(FlowError::NoExit(*stuck));
        }

        Ok(())
    }

    /// The Helios AI Labs sales script.
    pub fn helios() -> Result<Self, FlowError> {
        use NodeId::*;

        let back_to_menu = || DialogOption::new("🔁 Ver opciones de nuevo", "menu", MainMenu);
        let book = || DialogOption::new("📅 Quiero mi asesoría gratuita", "book", ContactCapture);

        let titles = [
            "Sr.", "Sra.", "Dr.", "Dra.", "Lic.", "Ing.", "Arq.", "C.P.", "Mtro.", "Mtra.",
            "Prof.", "Chef", "Coach", "Otro",
        ];

        let industries = [
            ("Salud", "salud"),
            ("Jurídico", "juridico"),
            ("Restaurante / Cafetería", "food"),
            ("Inmobiliario", "realestate"),
            ("Educación", "edu"),
            ("Contenido / Creativo", "content"),
            ("Comercio / Retail", "retail"),
            ("Profesional Independiente", "freelance"),
            ("Belleza / Spa", "beauty"),
        ];

        let mut industry_options: Vec<DialogOption> = industries
            .iter()
            .map(|(label, value)| DialogOption::new(*label, *value, Pitch).sets(LeadField::Industry))
            .collect();
        industry_options
            .push(DialogOption::new("Otro", OTHER_INDUSTRY, OtherIndustry).sets(LeadField::Industry));

        let nodes = vec![
            DialogNode::free_text(
                Greeting,
                "¡Hola! 👋 Soy Helios, asesor inteligente de Helios AI Labs.\n¿Con quién tengo el gusto?",
                ExtractorKind::Name,
                TitleSelect,
            ),
            DialogNode::menu(
                TitleSelect,
                "Mucho gusto, {givenName}. ¿Cómo prefiere que me dirija a usted? Elija una opción 👇",
                titles
                    .iter()
                    .map(|t| DialogOption::new(*t, *t, MainMenu).sets(LeadField::Title))
                    .collect(),
            ),
            DialogNode::menu(
                MainMenu,
                "Perfecto {title} {surname}, ¿qué información desea conocer?",
                vec![
                    DialogOption::new("A) ¿Cómo funciona la IA para mi negocio?", "A", HowItWorks),
                    DialogOption::new("B) Información de la empresa", "B", CompanyInfo),
                    DialogOption::new("C) ¿Por qué adoptar IA hoy?", "C", WhyNow),
                    DialogOption::new("D) Costos y ROI", "D", Roi),
                    DialogOption::new("E) Todo", "E", Everything),
                ],
            ),
            DialogNode::menu(
                HowItWorks,
                "Nuestros asistentes con IA atienden a sus clientes por chat y voz 24/7: \
                 responden dudas, agendan citas, cobran por adelantado y dan seguimiento sin que usted intervenga.",
                vec![
                    DialogOption::new("🏢 Ver cómo aplica a mi giro", "industry", Industry),
                    back_to_menu(),
                ],
            ),
            DialogNode::menu(
                CompanyInfo,
                "Helios AI Labs diseña e implementa automatizaciones con IA para negocios en México. \
                 Acompañamos la implementación de principio a fin.",
                vec![book(), back_to_menu()],
            ),
            DialogNode::menu(
                WhyNow,
                "Sus clientes ya esperan respuesta inmediata. Quien automatiza hoy captura la demanda \
                 que su competencia deja sin contestar.",
                vec![book(), back_to_menu()],
            ),
            DialogNode::menu(
                Roi,
                "La implementación se ajusta a su economía y está diseñada para recuperar su inversión \
                 en un máximo de 3 meses.",
                vec![book(), back_to_menu()],
            ),
            DialogNode::sequence(
                Everything,
                "¡Con gusto {title} {surname}! Le comparto todo:",
                vec![HowItWorks, CompanyInfo, WhyNow, Roi],
                ContactCapture,
            ),
            DialogNode::menu(
                Industry,
                "¿En qué giro se encuentra su negocio?",
                industry_options,
            ),
            DialogNode::free_text(
                OtherIndustry,
                "Cuénteme brevemente a qué se dedica su negocio:",
                ExtractorKind::Verbatim(LeadField::Subcategory),
                Pitch,
            ),
            DialogNode::menu(
                Pitch,
                "{industryPitch}\n\n¿Si la implementación fuera 100% accesible a su economía y garantizara \
                 recuperar su inversión en un máximo de 3 meses, estaría listo(a) para decidir hoy?",
                vec![
                    DialogOption::new("✅ Sí", "yes", ContactCapture).sets(LeadField::InterestLevel),
                    DialogOption::new("🤔 Lo tengo que pensar", "think", Authority)
                        .sets(LeadField::InterestLevel),
                    DialogOption::new("❄️ No es prioridad", "no", ShareWhatsapp)
                        .sets(LeadField::InterestLevel),
                ],
            ),
            DialogNode::menu(
                Authority,
                "¿Qué porcentaje de la decisión depende de usted?",
                vec![
                    DialogOption::new("Menos del 50%", "low", ShareWhatsapp)
                        .sets(LeadField::DecisionPower),
                    DialogOption::new("50% o más", "high", ContactCapture)
                        .sets(LeadField::DecisionPower),
                ],
            ),
            DialogNode::free_text(
                ContactCapture,
                "¡Excelente! 🚀\nPara agendar su asesoría gratuita escriba en un solo mensaje su email y \
                 teléfono (y si gusta, el día y la hora que prefiere):",
                ExtractorKind::Contact,
                LeadSubmit,
            ),
            DialogNode::deliver(
                LeadSubmit,
                "Gracias, {title} {surname}. Enviando su información…",
                Farewell,
                DeliveryFailed,
            ),
            DialogNode::menu(
                DeliveryFailed,
                "⚠️ Hubo un error al enviar la información. Puede intentarlo de nuevo o escribirnos por \
                 WhatsApp: 👉 {fallbackPhone}",
                vec![
                    DialogOption::new("🔄 Reintentar envío", "retry", LeadSubmit),
                    back_to_menu(),
                ],
            ),
            DialogNode::menu(
                ShareWhatsapp,
                "Perfecto. Puede escribirnos directamente por WhatsApp: 👉 {fallbackPhone}\n¡Excelente día!",
                vec![back_to_menu()],
            ),
            DialogNode::end(
                Farewell,
                "📨 Información enviada correctamente a Helios AI Labs. Un asesor se pondrá en contacto \
                 con usted en breve. 🙌",
            ),
        ];

        let pitches = [
            ("salud", "En consultorios y clínicas la IA contesta llamadas y mensajes, agenda y confirma citas 24/7, envía recordatorios que reducen cancelaciones y cobra consultas por adelantado."),
            ("juridico", "En su profesión la confianza, velocidad y resultados lo son todo. Con IA atiende más casos sin invertir más tiempo y filtra prospectos con capacidad económica real."),
            ("food", "En su negocio cada mensaje es una venta potencial. La IA responde al instante, agenda reservaciones y recomienda platillos 24/7."),
            ("realestate", "La competencia inmobiliaria es feroz. La IA le entrega prospectos calificados, agenda citas automáticamente y filtra propiedades con documentos en regla."),
            ("edu", "Hoy las familias deciden rápido. La IA responde dudas sobre costos, agenda visitas y ayuda a retener alumnos."),
            ("content", "Su marca puede multiplicar ingresos sin saturarse. La IA convierte seguidores en clientes y automatiza sus ventas digitales."),
            ("retail", "En comercio la venta ocurre en segundos. La IA responde al instante, muestra su catálogo y cobra sola."),
            ("freelance", "Su tiempo es dinero. La IA consigue clientes premium, da seguimiento sin esfuerzo y organiza su agenda."),
            ("beauty", "Quien busca un servicio de belleza decide en minutos. La IA responde al instante, agenda citas y envía recordatorios."),
            (OTHER_INDUSTRY, "Sea cual sea su giro, la IA atiende a sus clientes 24/7, agenda, cobra y da seguimiento para que usted se enfoque en crecer."),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self::new(Greeting, MainMenu, nodes, pitches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helios_script_is_valid_and_complete() {
        let table = NodeTable::helios().unwrap();
        assert_eq!(table.len(), NodeId::ALL.len());
        for id in NodeId::ALL {
            assert!(table.get(id).is_ok(), "missing {id}");
        }
        assert_eq!(table.start(), NodeId::Greeting);
        assert_eq!(table.main_menu(), NodeId::MainMenu);
    }

    #[test]
    fn every_industry_option_has_a_pitch() {
        let table = NodeTable::helios().unwrap();
        let NodeKind::Menu { options } = &table.get(NodeId::Industry).unwrap().kind else {
            panic!("industry should be a menu");
        };
        for option in options {
            assert!(table.pitch_for(&option.value).is_ok(), "no pitch for {}", option.value);
        }
        assert!(matches!(table.pitch_for("mining"), Err(FlowError::MissingPitch(_))));
    }

    #[test]
    fn every_recognized_honorific_is_a_title_button() {
        let table = NodeTable::helios().unwrap();
        let NodeKind::Menu { options } = &table.get(NodeId::TitleSelect).unwrap().kind else {
            panic!("title select should be a menu");
        };
        let spellings = [
            "Dr", "Dra", "Lic", "Ing", "Arq", "C.P.", "Mtro", "Mtra", "Sr", "Sra", "Don", "Doña",
            "Prof", "Profesor", "Profesora", "Coach", "Chef",
        ];
        for spelling in spellings {
            let title = crate::extract::canonical_honorific(spelling).unwrap();
            assert!(
                options.iter().any(|o| o.value == title),
                "{spelling} maps to {title}, which has no button"
            );
        }
    }

    #[test]
    fn dangling_transition_is_rejected() {
        let nodes = vec![
            DialogNode::menu(
                NodeId::MainMenu,
                "menu",
                vec![DialogOption::new("go", "go", NodeId::Roi)],
            ),
        ];
        let err = NodeTable::new(NodeId::MainMenu, NodeId::MainMenu, nodes, HashMap::new()).unwrap_err();
        assert!(matches!(
            err,
            FlowError::DanglingTransition { node: NodeId::MainMenu, target: NodeId::Roi }
        ));
    }

    #[test]
    fn unreachable_node_is_rejected() {
        let nodes = vec![
            DialogNode::menu(
                NodeId::MainMenu,
                "menu",
                vec![DialogOption::new("bye", "bye", NodeId::Farewell)],
            ),
            DialogNode::end(NodeId::Farewell, "bye"),
            DialogNode::end(NodeId::Roi, "orphan"),
        ];
        let err = NodeTable::new(NodeId::MainMenu, NodeId::MainMenu, nodes, HashMap::new()).unwrap_err();
        assert!(matches!(err, FlowError::Unreachable(NodeId::Roi)));
    }

    #[test]
    fn closed_loop_without_exit_is_rejected() {
        let nodes = vec![
            DialogNode::menu(
                NodeId::MainMenu,
                "menu",
                vec![
                    DialogOption::new("a", "a", NodeId::Roi),
                    DialogOption::new("bye", "bye", NodeId::Farewell),
                ],
            ),
            DialogNode::menu(NodeId::Roi, "roi", vec![DialogOption::new("b", "b", NodeId::WhyNow)]),
            DialogNode::menu(NodeId::WhyNow, "why", vec![DialogOption::new("a", "a", NodeId::Roi)]),
            DialogNode::end(NodeId::Farewell, "bye"),
        ];
        let err = NodeTable::new(NodeId::MainMenu, NodeId::MainMenu, nodes, HashMap::new()).unwrap_err();
        assert!(matches!(err, FlowError::NoExit(NodeId::Roi | NodeId::WhyNow)));
    }
}
