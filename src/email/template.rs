//! The HTML template for the expense notification email.

use std::fmt::Write;

use time::{OffsetDateTime, macros::format_description};

use crate::notifier::ExpenseNotification;

/// The subject line for an expense notification.
pub fn notification_subject(notification: &ExpenseNotification) -> String {
    format!("Nueva Solicitud de Gastos - {}", notification.local)
}

/// Render the notification email body.
///
/// The inline styles make the message readable in mail clients that strip
/// stylesheets.
pub fn render_expense_notification(notification: &ExpenseNotification) -> String {
    let mut items_html = String::new();

    for (index, item) in notification.items.iter().enumerate() {
        let background_color = if index % 2 == 0 { "#f9fafb" } else { "#ffffff" };
        let observacion = if item.observacion.is_empty() {
            "-"
        } else {
            &item.observacion
        };

        // Writing to a String cannot fail.
        let _ = write!(
            items_html,
            r#"
        <tr style="background-color: {background_color};">
          <td style="padding: 12px; border: 1px solid #e5e7eb;">{concepto}</td>
          <td style="padding: 12px; border: 1px solid #e5e7eb; color: #10b981; font-weight: 600; text-align: right;">${importe:.2}</td>
          <td style="padding: 12px; border: 1px solid #e5e7eb;">{observacion}</td>
        </tr>"#,
            concepto = item.concepto,
            importe = item.importe,
        );
    }

    let generated_at = OffsetDateTime::now_utc()
        .format(format_description!(
            "[day]/[month]/[year], [hour]:[minute]:[second]"
        ))
        .unwrap_or_default();

    format!(
        r#"
        <div style="font-family: Arial, sans-serif; max-width: 700px; margin: 0 auto;">
          <h2 style="color: #4f46e5; border-bottom: 2px solid #4f46e5; padding-bottom: 10px;">
            Nueva Solicitud de Gastos
          </h2>

          <table style="width: 100%; border-collapse: collapse; margin-top: 20px;">
            <tr style="background-color: #f9fafb;">
              <td style="padding: 12px; border: 1px solid #e5e7eb; font-weight: bold; width: 150px;">ID:</td>
              <td style="padding: 12px; border: 1px solid #e5e7eb;">#{pago_id}</td>
            </tr>
            <tr>
              <td style="padding: 12px; border: 1px solid #e5e7eb; font-weight: bold;">Local:</td>
              <td style="padding: 12px; border: 1px solid #e5e7eb;">{local}</td>
            </tr>
            <tr style="background-color: #f9fafb;">
              <td style="padding: 12px; border: 1px solid #e5e7eb; font-weight: bold;">Fecha:</td>
              <td style="padding: 12px; border: 1px solid #e5e7eb;">{fecha}</td>
            </tr>
            <tr>
              <td style="padding: 12px; border: 1px solid #e5e7eb; font-weight: bold;">Registrado por:</td>
              <td style="padding: 12px; border: 1px solid #e5e7eb; color: #4f46e5; font-weight: bold;">{usuario}</td>
            </tr>
          </table>

          <h3 style="color: #4f46e5; margin-top: 30px; margin-bottom: 15px;">Items del Gasto</h3>

          <table style="width: 100%; border-collapse: collapse;">
            <thead>
              <tr style="background-color: #4f46e5; color: white;">
                <th style="padding: 12px; border: 1px solid #e5e7eb; text-align: left;">Concepto</th>
                <th style="padding: 12px; border: 1px solid #e5e7eb; text-align: right;">Importe</th>
                <th style="padding: 12px; border: 1px solid #e5e7eb; text-align: left;">Observación</th>
              </tr>
            </thead>
            <tbody>{items_html}
            </tbody>
            <tfoot>
              <tr style="background-color: #f3f4f6; font-weight: bold;">
                <td style="padding: 12px; border: 1px solid #e5e7eb;">TOTAL</td>
                <td style="padding: 12px; border: 1px solid #e5e7eb; color: #10b981; font-size: 18px; text-align: right;">${total:.2}</td>
                <td style="padding: 12px; border: 1px solid #e5e7eb;"></td>
              </tr>
            </tfoot>
          </table>

          <hr style="margin: 30px 0; border: none; border-top: 1px solid #e5e7eb;">

          <p style="color: #6b7280; font-size: 14px; text-align: center;">
            <em>Registro generado automáticamente el {generated_at}</em>
          </p>
        </div>"#,
        pago_id = notification.pago_id,
        local = notification.local,
        fecha = notification.fecha,
        usuario = notification.usuario,
        total = notification.total,
    )
}
