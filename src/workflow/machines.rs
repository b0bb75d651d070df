use super::{Action, Machine, Transition};
use crate::status_enum;

status_enum! {
    /// Bon de commande
    PurchaseOrderStatus, "purchase_order" {
        EnAttente => "en_attente",
        Valide => "valide",
        EnCours => "en_cours",
        Livre => "livre",
        Annule => "annule",
    }
}

status_enum! {
    /// Commande entreprise, stored as 1..4
    EnterpriseOrderStatus, "enterprise_order", i16 {
        Soumis = 1 => "soumis",
        Valide = 2 => "valide",
        Rejete = 3 => "rejete",
        Livre = 4 => "livre",
    }
}

status_enum! {
    /// Devis, stored as 0..3
    QuoteStatus, "quote", i16 {
        Brouillon = 0 => "brouillon",
        Envoye = 1 => "envoye",
        Accepte = 2 => "accepte",
        Refuse = 3 => "refuse",
    }
}

status_enum! {
    ClientStatus, "client" {
        EnAttente => "en_attente",
        Valide => "valide",
        Rejete => "rejete",
    }
}

status_enum! {
    SupplierStatus, "supplier" {
        EnAttente => "en_attente",
        Valide => "valide",
        Rejete => "rejete",
        Inactif => "inactif",
    }
}

status_enum! {
    ContractStatus, "contract" {
        Draft => "draft",
        Pending => "pending",
        Active => "active",
        Expired => "expired",
        Terminated => "terminated",
        Cancelled => "cancelled",
    }
}

status_enum! {
    ExpenseStatus, "expense" {
        Draft => "draft",
        Submitted => "submitted",
        UnderReview => "under_review",
        Approved => "approved",
        Rejected => "rejected",
        Paid => "paid",
    }
}

status_enum! {
    LeaveStatus, "leave_request" {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        Cancelled => "cancelled",
    }
}

status_enum! {
    InterventionStatus, "intervention" {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
        InProgress => "in_progress",
        Completed => "completed",
    }
}

status_enum! {
    RecruitmentRequestStatus, "recruitment_request" {
        Draft => "draft",
        Approved => "approved",
        Published => "published",
        Closed => "closed",
        Cancelled => "cancelled",
    }
}

status_enum! {
    ApplicationStatus, "recruitment_application" {
        Pending => "pending",
        Reviewed => "reviewed",
        Shortlisted => "shortlisted",
        Interviewed => "interviewed",
        Hired => "hired",
        Rejected => "rejected",
    }
}

status_enum! {
    TaxStatus, "tax" {
        EnAttente => "en_attente",
        Valide => "valide",
        Rejete => "rejete",
        Paye => "paye",
    }
}

status_enum! {
    EvaluationStatus, "evaluation" {
        Brouillon => "brouillon",
        EnCours => "en_cours",
        Finalisee => "finalisee",
    }
}

status_enum! {
    StockStatus, "stock" {
        EnAttente => "en_attente",
        Valide => "valide",
        Rejete => "rejete",
    }
}

status_enum! {
    SalaryStatus, "salary" {
        Draft => "draft",
        Calculated => "calculated",
        Approved => "approved",
        Paid => "paid",
        Cancelled => "cancelled",
    }
}

status_enum! {
    EmployeeStatus, "employee" {
        Active => "active",
        Inactive => "inactive",
        OnLeave => "on_leave",
        Terminated => "terminated",
    }
}

status_enum! {
    /// Free-form on update; `retired` is terminal
    EquipmentStatus, "equipment" {
        Active => "active",
        Inactive => "inactive",
        Maintenance => "maintenance",
        Broken => "broken",
        Retired => "retired",
    }
}

pub static PURCHASE_ORDER: Machine<PurchaseOrderStatus> = {
    use PurchaseOrderStatus::*;
    Machine {
        initial: EnAttente,
        transitions: &[
            Transition { action: Action::Validate, from: &[EnAttente], to: Valide },
            Transition { action: Action::Reject, from: &[EnAttente], to: Annule },
            Transition { action: Action::Start, from: &[Valide], to: EnCours },
            Transition { action: Action::Deliver, from: &[EnCours], to: Livre },
            Transition { action: Action::Cancel, from: &[EnAttente, Valide, EnCours], to: Annule },
        ],
        editable: &[EnAttente, Annule],
        deletable: &[EnAttente, Annule],
    }
};

pub static ENTERPRISE_ORDER: Machine<EnterpriseOrderStatus> = {
    use EnterpriseOrderStatus::*;
    Machine {
        initial: Soumis,
        transitions: &[
            Transition { action: Action::Validate, from: &[Soumis], to: Valide },
            Transition { action: Action::Reject, from: &[Soumis, Valide], to: Rejete },
            Transition { action: Action::Deliver, from: &[Valide], to: Livre },
        ],
        editable: &[Soumis],
        deletable: &[Soumis],
    }
};

pub static QUOTE: Machine<QuoteStatus> = {
    use QuoteStatus::*;
    Machine {
        initial: Brouillon,
        transitions: &[
            Transition { action: Action::Send, from: &[Brouillon], to: Envoye },
            Transition { action: Action::Accept, from: &[Envoye], to: Accepte },
            Transition { action: Action::Reject, from: &[Envoye], to: Refuse },
        ],
        editable: &[Brouillon],
        deletable: &[Brouillon],
    }
};

pub static CLIENT: Machine<ClientStatus> = {
    use ClientStatus::*;
    Machine {
        initial: EnAttente,
        transitions: &[
            Transition { action: Action::Validate, from: &[EnAttente], to: Valide },
            Transition { action: Action::Reject, from: &[EnAttente], to: Rejete },
        ],
        editable: &[EnAttente],
        deletable: &[EnAttente],
    }
};

pub static SUPPLIER: Machine<SupplierStatus> = {
    use SupplierStatus::*;
    Machine {
        initial: EnAttente,
        transitions: &[
            Transition { action: Action::Validate, from: &[EnAttente], to: Valide },
            Transition { action: Action::Reject, from: &[EnAttente], to: Rejete },
            Transition { action: Action::Deactivate, from: &[Valide], to: Inactif },
            Transition { action: Action::Activate, from: &[Inactif, Rejete], to: Valide },
        ],
        editable: &[EnAttente, Valide, Rejete, Inactif],
        deletable: &[EnAttente, Rejete, Inactif],
    }
};

pub static CONTRACT: Machine<ContractStatus> = {
    use ContractStatus::*;
    Machine {
        initial: Draft,
        transitions: &[
            Transition { action: Action::Submit, from: &[Draft], to: Pending },
            Transition { action: Action::Approve, from: &[Pending], to: Active },
            Transition { action: Action::Reject, from: &[Pending], to: Cancelled },
            Transition { action: Action::Terminate, from: &[Active], to: Terminated },
            Transition { action: Action::Cancel, from: &[Draft, Pending], to: Cancelled },
            Transition { action: Action::Expire, from: &[Active], to: Expired },
        ],
        editable: &[Draft],
        deletable: &[Draft, Cancelled],
    }
};

pub static EXPENSE: Machine<ExpenseStatus> = {
    use ExpenseStatus::*;
    Machine {
        initial: Draft,
        transitions: &[
            Transition { action: Action::Submit, from: &[Draft], to: Submitted },
            Transition { action: Action::Review, from: &[Submitted], to: UnderReview },
            Transition { action: Action::Approve, from: &[Submitted, UnderReview], to: Approved },
            Transition { action: Action::Reject, from: &[Submitted, UnderReview], to: Rejected },
            Transition { action: Action::Pay, from: &[Approved], to: Paid },
        ],
        editable: &[Draft],
        deletable: &[Draft],
    }
};

pub static LEAVE_REQUEST: Machine<LeaveStatus> = {
    use LeaveStatus::*;
    Machine {
        initial: Pending,
        transitions: &[
            Transition { action: Action::Approve, from: &[Pending], to: Approved },
            Transition { action: Action::Reject, from: &[Pending], to: Rejected },
            Transition { action: Action::Cancel, from: &[Pending, Approved], to: Cancelled },
        ],
        editable: &[Pending],
        deletable: &[Pending, Cancelled],
    }
};

pub static INTERVENTION: Machine<InterventionStatus> = {
    use InterventionStatus::*;
    Machine {
        initial: Pending,
        transitions: &[
            Transition { action: Action::Approve, from: &[Pending], to: Approved },
            Transition { action: Action::Reject, from: &[Pending], to: Rejected },
            Transition { action: Action::Start, from: &[Approved], to: InProgress },
            Transition { action: Action::Complete, from: &[InProgress], to: Completed },
        ],
        editable: &[Pending, Rejected],
        deletable: &[Pending, Approved, Rejected],
    }
};

pub static RECRUITMENT_REQUEST: Machine<RecruitmentRequestStatus> = {
    use RecruitmentRequestStatus::*;
    Machine {
        initial: Draft,
        transitions: &[
            Transition { action: Action::Approve, from: &[Draft], to: Approved },
            Transition { action: Action::Publish, from: &[Draft, Approved], to: Published },
            Transition { action: Action::Close, from: &[Published], to: Closed },
            Transition { action: Action::Cancel, from: &[Draft, Approved, Published], to: Cancelled },
        ],
        editable: &[Draft],
        deletable: &[Draft],
    }
};

pub static APPLICATION: Machine<ApplicationStatus> = {
    use ApplicationStatus::*;
    Machine {
        initial: Pending,
        transitions: &[
            Transition { action: Action::Review, from: &[Pending], to: Reviewed },
            Transition { action: Action::Shortlist, from: &[Pending, Reviewed], to: Shortlisted },
            Transition { action: Action::Interview, from: &[Shortlisted], to: Interviewed },
            Transition { action: Action::Hire, from: &[Shortlisted, Interviewed], to: Hired },
            Transition { action: Action::Reject, from: &[Pending, Reviewed, Shortlisted, Interviewed], to: Rejected },
        ],
        editable: &[Pending, Reviewed, Shortlisted, Interviewed],
        deletable: &[Pending, Rejected],
    }
};

pub static TAX: Machine<TaxStatus> = {
    use TaxStatus::*;
    Machine {
        initial: EnAttente,
        transitions: &[
            Transition { action: Action::Validate, from: &[EnAttente], to: Valide },
            Transition { action: Action::Reject, from: &[EnAttente], to: Rejete },
            Transition { action: Action::Pay, from: &[Valide], to: Paye },
        ],
        editable: &[EnAttente],
        deletable: &[EnAttente],
    }
};

pub static EVALUATION: Machine<EvaluationStatus> = {
    use EvaluationStatus::*;
    Machine {
        initial: Brouillon,
        transitions: &[
            Transition { action: Action::SignEmployee, from: &[Brouillon, EnCours], to: EnCours },
            Transition { action: Action::Finalize, from: &[Brouillon, EnCours], to: Finalisee },
        ],
        editable: &[Brouillon, EnCours],
        deletable: &[Brouillon, EnCours],
    }
};

pub static STOCK: Machine<StockStatus> = {
    use StockStatus::*;
    Machine {
        initial: EnAttente,
        transitions: &[
            Transition { action: Action::Validate, from: &[EnAttente], to: Valide },
            Transition { action: Action::Reject, from: &[EnAttente], to: Rejete },
        ],
        editable: &[EnAttente, Valide, Rejete],
        deletable: &[EnAttente, Rejete],
    }
};

pub static SALARY: Machine<SalaryStatus> = {
    use SalaryStatus::*;
    Machine {
        initial: Draft,
        transitions: &[
            Transition { action: Action::Calculate, from: &[Draft], to: Calculated },
            Transition { action: Action::Approve, from: &[Draft, Calculated], to: Approved },
            Transition { action: Action::Pay, from: &[Approved], to: Paid },
            Transition { action: Action::Reject, from: &[Draft, Calculated], to: Cancelled },
        ],
        editable: &[Draft],
        deletable: &[Draft],
    }
};

pub static EMPLOYEE: Machine<EmployeeStatus> = {
    use EmployeeStatus::*;
    Machine {
        initial: Active,
        transitions: &[
            Transition { action: Action::Activate, from: &[Inactive, OnLeave], to: Active },
            Transition { action: Action::Deactivate, from: &[Active, OnLeave], to: Inactive },
            Transition { action: Action::Leave, from: &[Active], to: OnLeave },
            Transition { action: Action::Terminate, from: &[Active, Inactive, OnLeave], to: Terminated },
        ],
        editable: &[Active, Inactive, OnLeave],
        deletable: &[Inactive, Terminated],
    }
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{Status, WorkflowError};

    #[test]
    fn purchase_order_happy_path() {
        use PurchaseOrderStatus::*;
        let m = &PURCHASE_ORDER;
        let s = m.apply(m.initial, Action::Validate).unwrap();
        assert_eq!(s, Valide);
        let s = m.apply(s, Action::Start).unwrap();
        assert_eq!(s, EnCours);
        assert_eq!(m.apply(s, Action::Deliver).unwrap(), Livre);
    }

    #[test]
    fn purchase_order_rejects_illegal_moves() {
        use PurchaseOrderStatus::*;
        let err = PURCHASE_ORDER.apply(EnAttente, Action::Deliver).unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::IllegalTransition { entity: "purchase_order", action: Action::Deliver, ref from } if from == "en_attente"
        ));
        assert!(PURCHASE_ORDER.apply(Livre, Action::Cancel).is_err());
        assert!(matches!(
            PURCHASE_ORDER.apply(EnAttente, Action::Hire),
            Err(WorkflowError::UnknownAction { .. })
        ));
    }

    #[test]
    fn purchase_order_cancel_from_any_open_status() {
        use PurchaseOrderStatus::*;
        for from in [EnAttente, Valide, EnCours] {
            assert_eq!(PURCHASE_ORDER.apply(from, Action::Cancel).unwrap(), Annule);
        }
    }

    #[test]
    fn allowed_actions_follow_table_order() {
        assert_eq!(
            PURCHASE_ORDER.allowed_actions(PurchaseOrderStatus::EnAttente),
            vec![Action::Validate, Action::Reject, Action::Cancel]
        );
        assert!(PURCHASE_ORDER.allowed_actions(PurchaseOrderStatus::Livre).is_empty());
        assert_eq!(
            EVALUATION.allowed_actions(EvaluationStatus::EnCours),
            vec![Action::SignEmployee, Action::Finalize]
        );
    }

    #[test]
    fn coded_statuses_round_trip() {
        for status in EnterpriseOrderStatus::ALL {
            assert_eq!(EnterpriseOrderStatus::from_code(status.code()).unwrap(), *status);
        }
        assert_eq!(QuoteStatus::Brouillon.code(), 0);
        assert_eq!(QuoteStatus::Refuse.code(), 3);
        assert_eq!(EnterpriseOrderStatus::Soumis.code(), 1);
        assert!(QuoteStatus::from_code(9).is_err());
    }

    #[test]
    fn wire_names_serialize_as_strings() {
        assert_eq!(serde_json::to_value(QuoteStatus::Accepte).unwrap(), serde_json::json!("accepte"));
        assert_eq!(
            serde_json::from_value::<ExpenseStatus>(serde_json::json!("under_review")).unwrap(),
            ExpenseStatus::UnderReview
        );
        assert!(serde_json::from_value::<ExpenseStatus>(serde_json::json!("lost")).is_err());
        assert_eq!("en_cours".parse::<PurchaseOrderStatus>().unwrap(), PurchaseOrderStatus::EnCours);
    }

    #[test]
    fn enterprise_order_reject_from_submitted_or_validated() {
        use EnterpriseOrderStatus::*;
        assert_eq!(ENTERPRISE_ORDER.apply(Soumis, Action::Reject).unwrap(), Rejete);
        assert_eq!(ENTERPRISE_ORDER.apply(Valide, Action::Reject).unwrap(), Rejete);
        assert!(ENTERPRISE_ORDER.apply(Livre, Action::Reject).is_err());
    }

    #[test]
    fn quote_lifecycle() {
        use QuoteStatus::*;
        assert_eq!(QUOTE.apply(Brouillon, Action::Send).unwrap(), Envoye);
        assert_eq!(QUOTE.apply(Envoye, Action::Accept).unwrap(), Accepte);
        assert!(QUOTE.apply(Brouillon, Action::Accept).is_err());
    }

    #[test]
    fn contract_reject_cancels_and_terminate_needs_active() {
        use ContractStatus::*;
        assert_eq!(CONTRACT.apply(Pending, Action::Reject).unwrap(), Cancelled);
        assert!(CONTRACT.apply(Draft, Action::Terminate).is_err());
        assert_eq!(CONTRACT.apply(Active, Action::Expire).unwrap(), Expired);
    }

    #[test]
    fn expense_can_be_approved_with_or_without_review() {
        use ExpenseStatus::*;
        assert_eq!(EXPENSE.apply(Submitted, Action::Approve).unwrap(), Approved);
        assert_eq!(EXPENSE.apply(UnderReview, Action::Approve).unwrap(), Approved);
        assert!(EXPENSE.apply(Draft, Action::Pay).is_err());
    }

    #[test]
    fn supplier_reactivation() {
        use SupplierStatus::*;
        assert_eq!(SUPPLIER.apply(Inactif, Action::Activate).unwrap(), Valide);
        assert_eq!(SUPPLIER.apply(Rejete, Action::Activate).unwrap(), Valide);
        assert!(SUPPLIER.apply(EnAttente, Action::Activate).is_err());
    }

    #[test]
    fn recruitment_and_applications() {
        assert_eq!(
            RECRUITMENT_REQUEST.apply(RecruitmentRequestStatus::Draft, Action::Publish).unwrap(),
            RecruitmentRequestStatus::Published
        );
        use ApplicationStatus::*;
        assert_eq!(APPLICATION.apply(Interviewed, Action::Hire).unwrap(), Hired);
        assert!(APPLICATION.apply(Hired, Action::Reject).is_err());
    }

    #[test]
    fn salary_and_tax_paths() {
        assert_eq!(SALARY.apply(SalaryStatus::Draft, Action::Calculate).unwrap(), SalaryStatus::Calculated);
        assert!(SALARY.apply(SalaryStatus::Draft, Action::Pay).is_err());
        assert_eq!(TAX.apply(TaxStatus::Valide, Action::Pay).unwrap(), TaxStatus::Paye);
    }

    #[test]
    fn employee_and_leave_and_intervention() {
        assert_eq!(EMPLOYEE.apply(EmployeeStatus::OnLeave, Action::Activate).unwrap(), EmployeeStatus::Active);
        assert!(EMPLOYEE.apply(EmployeeStatus::Terminated, Action::Activate).is_err());
        assert_eq!(LEAVE_REQUEST.apply(LeaveStatus::Approved, Action::Cancel).unwrap(), LeaveStatus::Cancelled);
        assert_eq!(
            INTERVENTION.apply(InterventionStatus::InProgress, Action::Complete).unwrap(),
            InterventionStatus::Completed
        );
    }

    #[test]
    fn edit_and_delete_guards() {
        assert!(PURCHASE_ORDER.ensure_editable(PurchaseOrderStatus::Annule).is_ok());
        let err = PURCHASE_ORDER.ensure_editable(PurchaseOrderStatus::Valide).unwrap_err();
        assert_eq!(err.to_string(), "Cannot update purchase_order in status 'valide'");
        assert!(CONTRACT.ensure_deletable(ContractStatus::Cancelled).is_ok());
        assert!(CONTRACT.ensure_editable(ContractStatus::Cancelled).is_err());
        assert!(INTERVENTION.ensure_deletable(InterventionStatus::InProgress).is_err());
        assert!(EVALUATION.ensure_editable(EvaluationStatus::Finalisee).is_err());
    }

    #[test]
    fn initial_statuses() {
        assert_eq!(CONTRACT.initial.as_str(), "draft");
        assert_eq!(EXPENSE.initial, ExpenseStatus::Draft);
        assert_eq!(<TaxStatus as Status>::ENTITY, "tax");
    }
}
