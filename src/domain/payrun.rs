use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::Money;
use crate::types::{EmployeeId, PayPeriod};

/// one employee's computed pay for a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRunLine {
    pub employee_id: EmployeeId,
    pub employee_name: String,
    pub total_working_days: u8,
    pub payable_days: u8,
    pub loss_of_pay_days: u8,
    pub basic: Money,
    pub hra: Money,
    pub conveyance: Money,
    pub telephone: Money,
    pub medical_allowance: Money,
    pub special_allowance: Money,
    /// prorated monthly gross
    pub gross: Money,
    pub pf_deduction: Money,
    pub esi_deduction: Money,
    pub professional_tax: Money,
    pub tds_monthly: Money,
    pub loan_emi: Money,
    pub advance_deduction: Money,
    pub loss_of_pay_amount: Money,
    pub total_deductions: Money,
    pub net: Money,
}

impl PayRunLine {
    pub fn statutory_deductions(&self) -> Money {
        self.pf_deduction + self.esi_deduction + self.professional_tax + self.tds_monthly
    }
}

/// immutable snapshot of one month's payroll for all active employees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRun {
    pub id: Uuid,
    pub period: PayPeriod,
    pub generated_at: DateTime<Utc>,
    /// username of the generator
    pub generated_by: String,
    pub total_gross: Money,
    pub total_deductions: Money,
    pub total_net: Money,
    pub lines: Vec<PayRunLine>,
}

impl PayRun {
    pub fn new(
        period: PayPeriod,
        generated_by: String,
        lines: Vec<PayRunLine>,
        now: DateTime<Utc>,
    ) -> Self {
        let total_gross = lines.iter().map(|l| l.gross).sum();
        let total_deductions = lines.iter().map(|l| l.total_deductions).sum();
        let total_net = lines.iter().map(|l| l.net).sum();
        PayRun {
            id: Uuid::new_v4(),
            period,
            generated_at: now,
            generated_by,
            total_gross,
            total_deductions,
            total_net,
            lines,
        }
    }

    /// totals must equal the sums of the line items
    pub fn totals_consistent(&self) -> bool {
        self.total_gross == self.lines.iter().map(|l| l.gross).sum()
            && self.total_deductions == self.lines.iter().map(|l| l.total_deductions).sum()
            && self.total_net == self.lines.iter().map(|l| l.net).sum()
    }

    /// CSV projection of the stored line items, for the export endpoint
    pub fn to_csv(&self) -> String {
        let mut out = String::from(
            "employeeId,employeeName,payableDays,totalWorkingDays,basic,hra,conveyance,\
             telephone,medicalAllowance,specialAllowance,gross,pfDeduction,esiDeduction,\
             professionalTax,tdsMonthly,loanEmi,advanceDeduction,lossOfPayAmount,\
             totalDeductions,net\n",
        );
        for line in &self.lines {
            let name = if line.employee_name.contains(',') {
                format!("\"{}\"", line.employee_name)
            } else {
                line.employee_name.clone()
            };
            out.push_str(&format!(
                "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
                line.employee_id,
                name,
                line.payable_days,
                line.total_working_days,
                line.basic,
                line.hra,
                line.conveyance,
                line.telephone,
                line.medical_allowance,
                line.special_allowance,
                line.gross,
                line.pf_deduction,
                line.esi_deduction,
                line.professional_tax,
                line.tds_monthly,
                line.loan_emi,
                line.advance_deduction,
                line.loss_of_pay_amount,
                line.total_deductions,
                line.net,
            ));
        }
        out
    }
}
